//! Socket dialing.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{Sink, Stream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Message-level duplex socket the session drives.
pub trait PushSocket:
    Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send + 'static
{
}

impl<T> PushSocket for T where
    T: Stream<Item = Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static
{
}

/// Opens push sockets.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Socket type produced by this dialer.
    type Socket: PushSocket;

    /// Open a socket to `url`, completing the WebSocket handshake.
    async fn dial(&self, url: &str) -> Result<Self::Socket, WsError>;
}

/// Dialer backed by `tokio-tungstenite` (`ws://` and `wss://`).
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteDialer;

#[async_trait]
impl Dialer for TungsteniteDialer {
    type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn dial(&self, url: &str) -> Result<Self::Socket, WsError> {
        let (ws, _response) = connect_async(url).await?;
        Ok(ws)
    }
}

#[async_trait]
impl<D: Dialer> Dialer for Arc<D> {
    type Socket = D::Socket;

    async fn dial(&self, url: &str) -> Result<D::Socket, WsError> {
        self.as_ref().dial(url).await
    }
}
