//! Session observation hooks.
//!
//! The session reports what happens on the wire through a
//! [`SessionObserver`] instead of logging directly. [`TracingObserver`] is
//! the default and turns every hook into a `tracing` event.

use tracing::{debug, info, warn};

use crate::delivery::{FrameFault, MessageBody, PushEvent};
use crate::errors::PusherError;
use crate::state::SessionState;

/// Receives session lifecycle and per-frame notifications.
///
/// Hooks run inline on the session's tasks and must not block.
pub trait SessionObserver: Send + Sync {
    /// The session moved from `from` to `to`.
    fn state_changed(&self, from: SessionState, to: SessionState) {
        let _ = (from, to);
    }

    /// A socket to `url` is open.
    fn connected(&self, url: &str) {
        let _ = url;
    }

    /// A heartbeat frame was written.
    fn heartbeat_sent(&self) {}

    /// A connection ended with `error`.
    fn connection_failed(&self, error: &PusherError) {
        let _ = error;
    }

    /// A frame was skipped because it did not decode.
    fn frame_skipped(&self, fault: &FrameFault) {
        let _ = fault;
    }

    /// An event is about to be handed to the consumer.
    fn event_received(&self, event: &PushEvent) {
        let _ = event;
    }

    /// The consumer dropped its receiver and `event` was discarded.
    fn event_discarded(&self, event: &PushEvent) {
        let _ = event;
    }
}

/// Observer that logs through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn state_changed(&self, from: SessionState, to: SessionState) {
        debug!(from = %from, to = %to, "push session state changed");
    }

    fn connected(&self, url: &str) {
        info!(url, "connected to pusher");
    }

    fn heartbeat_sent(&self) {
        debug!("heartbeat sent");
    }

    fn connection_failed(&self, error: &PusherError) {
        warn!(code = error.code(), error = %error, "push connection ended");
    }

    fn frame_skipped(&self, fault: &FrameFault) {
        warn!(
            code = fault.error.code(),
            error = %fault.error,
            frame = %fault.excerpt,
            "skipping undecodable frame"
        );
    }

    fn event_received(&self, event: &PushEvent) {
        let kind = event.event.kind();
        if let Some(MessageBody::Undecryptable { reason, .. }) = &event.body {
            warn!(
                kind = %kind,
                conversation_id = event.event.conversation_id(),
                error = %reason,
                "message body did not decrypt, delivering ciphertext"
            );
        }
        debug!(kind = %kind, "event received");
    }

    fn event_discarded(&self, event: &PushEvent) {
        debug!(kind = %event.event.kind(), "no event consumer, discarding");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
