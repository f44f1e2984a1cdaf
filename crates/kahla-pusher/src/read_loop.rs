//! The per-connection read loop.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use kahla_core::decode_event;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::delivery::{FrameFault, PushEvent};
use crate::observer::SessionObserver;

/// Where the read loop sends what it reads.
pub(crate) struct ReadSinks {
    pub events: mpsc::Sender<PushEvent>,
    pub faults: mpsc::Sender<FrameFault>,
    pub observer: Arc<dyn SessionObserver>,
}

/// Read frames until the peer closes or the transport fails.
///
/// Returns `Ok` on a close frame or end of stream. Undecodable frames are
/// published as faults and skipped. Event delivery waits for channel capacity.
pub(crate) async fn read_loop<R>(mut stream: R, sinks: ReadSinks) -> Result<(), WsError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(WsError::ConnectionClosed) => return Ok(()),
            // pings are answered by tungstenite
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                continue;
            }
            Err(error) => return Err(error),
        };
        if text.is_empty() {
            continue;
        }

        match decode_event(text.as_str()) {
            Ok(event) => {
                let push = PushEvent::from_event(event);
                sinks.observer.event_received(&push);
                if let Err(mpsc::error::SendError(push)) = sinks.events.send(push).await {
                    sinks.observer.event_discarded(&push);
                }
            }
            Err(error) => {
                let fault = FrameFault::new(text.as_str(), error);
                sinks.observer.frame_skipped(&fault);
                // drop-newest when the fault consumer lags
                let _ = sinks.faults.try_send(fault);
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
