//! Session configuration.

use std::time::Duration;

use kahla_core::constants::{CLOSE_GRACE, EVENT_BUFFER, FAULT_BUFFER, HEARTBEAT_INTERVAL};

/// Timing and buffering parameters of a push session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period between heartbeat frames, measured from connection start.
    /// Periods under one second are raised to one second.
    pub heartbeat_interval: Duration,
    /// How long a graceful close waits for the peer's close acknowledgment.
    pub close_grace: Duration,
    /// Capacity of the delivered-event channel. Must be positive.
    pub event_buffer: usize,
    /// Capacity of the frame-fault channel. Must be positive.
    pub fault_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            close_grace: CLOSE_GRACE,
            event_buffer: EVENT_BUFFER,
            fault_buffer: FAULT_BUFFER,
        }
    }
}
