//! The push session state machine.
//!
//! One [`PushSession::connect`] call owns one socket for its whole life:
//!
//! ```text
//! dial ──► Connected ──┬─ read loop ends cleanly ──► Disconnected, Ok
//!                      ├─ read loop fails ─────────► Disconnected, Err(Read)
//!                      ├─ heartbeat write fails ───► Disconnected, Err(Write)
//!                      └─ interrupt / close() ─────► close frame, grace wait,
//!                                                    Closed, Ok or Err(Close)
//! ```
//!
//! The read loop runs as its own task and owns the read half of the socket;
//! the control loop here owns the write half and the heartbeat timer, so a
//! slow event consumer never delays heartbeats or shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, Utf8Bytes};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::delivery::{FrameFault, PushEvent};
use crate::dialer::{Dialer, TungsteniteDialer};
use crate::errors::PusherError;
use crate::observer::{SessionObserver, TracingObserver};
use crate::read_loop::{ReadSinks, read_loop};
use crate::state::SessionState;

/// Receiving ends of a session's output channels.
#[derive(Debug)]
pub struct SessionChannels {
    /// Decoded events, in wire order. Bounded; a full channel stalls reading.
    pub events: mpsc::Receiver<PushEvent>,
    /// Frames that did not decode. Bounded; the newest fault is dropped when full.
    pub faults: mpsc::Receiver<FrameFault>,
}

/// A resilient push channel client.
///
/// Reusable across reconnects: call [`connect`](Self::connect) again after it
/// returns with the session `Disconnected`. Concurrent `connect` calls on one
/// session are not supported.
pub struct PushSession<D = TungsteniteDialer> {
    dialer: D,
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
    state: watch::Sender<SessionState>,
    events: mpsc::Sender<PushEvent>,
    faults: mpsc::Sender<FrameFault>,
    shutdown: CancellationToken,
    connecting: AtomicBool,
}

impl PushSession<TungsteniteDialer> {
    /// Session over real WebSockets with default config and tracing output.
    pub fn with_defaults() -> (Self, SessionChannels) {
        Self::new(
            TungsteniteDialer,
            SessionConfig::default(),
            Arc::new(TracingObserver),
        )
    }
}

impl<D: Dialer> PushSession<D> {
    /// Create a session in state `New` and the channels it delivers to.
    pub fn new(
        dialer: D,
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> (Self, SessionChannels) {
        let (events, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (faults, faults_rx) = mpsc::channel(config.fault_buffer.max(1));
        let (state, _) = watch::channel(SessionState::New);
        let session = Self {
            dialer,
            config,
            observer,
            state,
            events,
            faults,
            shutdown: CancellationToken::new(),
            connecting: AtomicBool::new(false),
        };
        let channels = SessionChannels {
            events: events_rx,
            faults: faults_rx,
        };
        (session, channels)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver of state changes. Last value wins; intermediate states may be
    /// skipped by a slow reader, [`state`](Self::state) is always current.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to `url` and run until the connection ends.
    ///
    /// Returns `Ok` with the session `Disconnected` when the peer closes
    /// cleanly, `Ok` with the session `Closed` after `interrupt` fires or
    /// [`close`](Self::close) is called, and an error with the session
    /// `Disconnected` on transport failure. The socket is released before
    /// this returns.
    pub async fn connect(
        &self,
        url: &str,
        interrupt: &CancellationToken,
    ) -> Result<(), PusherError> {
        let guard = ConnectGuard::enter(self);
        let result = self.run(url, interrupt).await;
        if let Err(error) = &result {
            self.observer.connection_failed(error);
        }
        drop(guard);
        result
    }

    /// Shut the session down. Idempotent and callable from any task.
    ///
    /// A running [`connect`](Self::connect) sends a close frame and returns;
    /// without one the state moves to `Closed` directly. Later `connect`
    /// calls return immediately.
    pub fn close(&self) {
        self.shutdown.cancel();
        if !self.connecting.load(Ordering::SeqCst) {
            self.set_state(SessionState::Closed);
        }
    }

    async fn run(&self, url: &str, interrupt: &CancellationToken) -> Result<(), PusherError> {
        if self.shutdown.is_cancelled() || interrupt.is_cancelled() {
            self.set_state(SessionState::Closed);
            return Ok(());
        }

        let socket = tokio::select! {
            dialed = self.dialer.dial(url) => dialed.map_err(|e| PusherError::dial(url, e))?,
            () = interrupt.cancelled() => {
                self.set_state(SessionState::Closed);
                return Ok(());
            }
            () = self.shutdown.cancelled() => {
                self.set_state(SessionState::Closed);
                return Ok(());
            }
        };

        self.set_state(SessionState::Connected);
        self.observer.connected(url);

        let (mut sink, stream) = socket.split();
        let mut reader = tokio::spawn(read_loop(
            stream,
            ReadSinks {
                events: self.events.clone(),
                faults: self.faults.clone(),
                observer: Arc::clone(&self.observer),
            },
        ));

        let period = self.config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                joined = &mut reader => {
                    self.set_state(SessionState::Disconnected);
                    return match joined {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(error)) => Err(PusherError::Read(Box::new(error))),
                        Err(join_error) => Err(PusherError::Reader(join_error)),
                    };
                }
                _ = heartbeat.tick() => {
                    if let Err(error) = sink.send(Message::Text(Utf8Bytes::from_static(""))).await {
                        stop_reader(reader).await;
                        self.set_state(SessionState::Disconnected);
                        return Err(PusherError::Write(Box::new(error)));
                    }
                    self.observer.heartbeat_sent();
                }
                () = interrupt.cancelled() => break,
                () = self.shutdown.cancelled() => break,
            }
        }

        let sent = sink.send(normal_close()).await;
        if tokio::time::timeout(self.config.close_grace, &mut reader)
            .await
            .is_err()
        {
            tracing::debug!("peer did not acknowledge close within grace window");
            stop_reader(reader).await;
        }
        drop(sink);
        self.set_state(SessionState::Closed);
        sent.map_err(|error| PusherError::Close(Box::new(error)))
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            self.observer.state_changed(previous, next);
        }
    }
}

impl<D> std::fmt::Debug for PushSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSession")
            .field("state", &*self.state.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Shortest heartbeat period a session uses.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

fn normal_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(""),
    }))
}

/// Abort the read task and wait for it so its socket half is dropped.
async fn stop_reader(reader: JoinHandle<Result<(), WsError>>) {
    reader.abort();
    let _ = reader.await;
}

/// Marks a `connect` call as running for [`PushSession::close`].
///
/// Dropping it clears the mark and then re-checks shutdown, so a `close()`
/// that saw the mark still leaves the session `Closed`.
struct ConnectGuard<'a, D: Dialer>(&'a PushSession<D>);

impl<'a, D: Dialer> ConnectGuard<'a, D> {
    fn enter(session: &'a PushSession<D>) -> Self {
        session.connecting.store(true, Ordering::SeqCst);
        Self(session)
    }
}

impl<D: Dialer> Drop for ConnectGuard<'_, D> {
    fn drop(&mut self) {
        self.0.connecting.store(false, Ordering::SeqCst);
        if self.0.shutdown.is_cancelled() {
            self.0.set_state(SessionState::Closed);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
