//! Push session error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Transport failure that ends a [`PushSession::connect`](crate::PushSession::connect) call.
///
/// Every variant except [`Close`](Self::Close) leaves the session
/// `Disconnected`, and the caller is expected to reconnect.
#[derive(Debug, Error)]
pub enum PusherError {
    /// Opening the socket failed.
    #[error("failed to connect to {url}: {source}")]
    Dial {
        /// Address that was dialed.
        url: String,
        /// Handshake or TCP error.
        #[source]
        source: Box<WsError>,
    },

    /// The read loop failed.
    #[error("push channel read failed: {0}")]
    Read(#[source] Box<WsError>),

    /// The read loop task panicked or was cancelled.
    #[error("push channel reader stopped: {0}")]
    Reader(#[source] tokio::task::JoinError),

    /// Writing a heartbeat frame failed.
    #[error("heartbeat write failed: {0}")]
    Write(#[source] Box<WsError>),

    /// Writing the close frame failed. The session is `Closed` regardless.
    #[error("close frame write failed: {0}")]
    Close(#[source] Box<WsError>),
}

impl PusherError {
    pub(crate) fn dial(url: &str, source: WsError) -> Self {
        Self::Dial {
            url: url.to_string(),
            source: Box::new(source),
        }
    }

    /// Short machine-readable tag for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Dial { .. } => "dial",
            Self::Read(_) => "read",
            Self::Reader(_) => "reader",
            Self::Write(_) => "write",
            Self::Close(_) => "close",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
