//! In-memory sockets for exercising sessions without a network.
//!
//! [`socket_pair`] returns a [`MemorySocket`] for the session and a
//! [`MemoryPeer`] that plays the server. [`MemoryDialer`] hands out queued
//! sockets (or dial errors) in order.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{Sink, Stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::dialer::Dialer;

/// Client side of an in-memory socket.
#[derive(Debug)]
pub struct MemorySocket {
    incoming: mpsc::UnboundedReceiver<Result<Message, WsError>>,
    outgoing: mpsc::UnboundedSender<Message>,
    fail_writes: Arc<AtomicBool>,
}

/// Server side of an in-memory socket.
#[derive(Debug)]
pub struct MemoryPeer {
    to_client: Option<mpsc::UnboundedSender<Result<Message, WsError>>>,
    from_client: mpsc::UnboundedReceiver<Message>,
    fail_writes: Arc<AtomicBool>,
}

/// Create a connected socket/peer pair.
pub fn socket_pair() -> (MemorySocket, MemoryPeer) {
    let (to_client, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_client) = mpsc::unbounded_channel();
    let fail_writes = Arc::new(AtomicBool::new(false));
    (
        MemorySocket {
            incoming,
            outgoing,
            fail_writes: Arc::clone(&fail_writes),
        },
        MemoryPeer {
            to_client: Some(to_client),
            from_client,
            fail_writes,
        },
    )
}

impl MemoryPeer {
    /// Send a text frame to the client. Returns `false` once the client is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Ok(Message::Text(text.into().into())))
    }

    /// Send any frame or transport error to the client.
    pub fn send(&self, frame: Result<Message, WsError>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// Next frame written by the client, `None` once the client side is dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.from_client.recv().await
    }

    /// Frame already written by the client, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.from_client.try_recv().ok()
    }

    /// Make every later client write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// End the client's read stream without a close frame.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    /// Answer the next client close frame with a close frame, then hang up.
    ///
    /// Frames received before the close are returned.
    pub async fn acknowledge_close(&mut self) -> Vec<Message> {
        let mut seen = Vec::new();
        while let Some(frame) = self.recv().await {
            if let Message::Close(close) = frame {
                let _ = self.send(Ok(Message::Close(close)));
                self.hang_up();
                break;
            }
            seen.push(frame);
        }
        seen
    }
}

impl Stream for MemorySocket {
    type Item = Result<Message, WsError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.incoming.poll_recv(cx)
    }
}

impl Sink<Message> for MemorySocket {
    type Error = WsError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Poll::Ready(Err(WsError::AlreadyClosed))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), WsError> {
        self.outgoing
            .send(item)
            .map_err(|_| WsError::ConnectionClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
        Poll::Ready(Ok(()))
    }
}

/// Dialer that hands out queued in-memory sockets.
///
/// An empty queue fails the dial with a refused connection.
#[derive(Debug, Default)]
pub struct MemoryDialer {
    queue: Mutex<VecDeque<Result<MemorySocket, WsError>>>,
    dialed: Mutex<Vec<String>>,
    attempts: AtomicUsize,
}

impl MemoryDialer {
    /// Empty dialer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a socket and return its peer.
    pub fn push_socket(&self) -> MemoryPeer {
        let (socket, peer) = socket_pair();
        self.queue.lock().push_back(Ok(socket));
        peer
    }

    /// Queue a dial failure.
    pub fn push_error(&self, error: WsError) {
        self.queue.lock().push_back(Err(error));
    }

    /// Number of dial attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// URLs dialed so far, in order.
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().clone()
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    type Socket = MemorySocket;

    async fn dial(&self, url: &str) -> Result<MemorySocket, WsError> {
        let _ = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.dialed.lock().push(url.to_string());
        self.queue.lock().pop_front().unwrap_or_else(|| {
            Err(WsError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )))
        })
    }
}
