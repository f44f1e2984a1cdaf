//! Client runner error types.

use kahla_api::ApiError;
use kahla_pusher::PusherError;
use thiserror::Error;

/// Why [`Client::run`](crate::Client::run) stopped, or why one attempt of it failed.
#[derive(Debug, Error)]
pub enum RunError {
    /// A REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The push session failed.
    #[error(transparent)]
    Pusher(#[from] PusherError),

    /// The server closed the push channel cleanly.
    #[error("push channel closed by the server")]
    PeerClosed,
}

impl RunError {
    /// Short machine-readable tag for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Api(_) => "api",
            Self::Pusher(e) => e.code(),
            Self::PeerClosed => "peer_closed",
        }
    }

    /// Whether the server rejected the request outright, so trying again
    /// cannot help. Rejected credentials are the usual case.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Api(e @ ApiError::Application { .. }) => {
                !e.is_retryable() && !e.is_unauthorized()
            }
            _ => false,
        }
    }
}

/// A [`Notifier`](crate::Notifier) could not show a notification.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);
