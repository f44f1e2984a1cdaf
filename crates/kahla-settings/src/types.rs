//! Settings types.
//!
//! All structs serialize as camelCase and fall back to compiled defaults for
//! any field a settings file leaves out.

use std::time::Duration;

use kahla_core::constants::{
    CLOSE_GRACE, DEFAULT_OSS_URL, DEFAULT_SERVER_URL, EVENT_BUFFER, HEARTBEAT_INTERVAL,
};
use kahla_core::retry::RetryConfig;
use kahla_logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings for the notifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KahlaSettings {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// REST server base URL.
    pub server_url: String,
    /// Object storage base URL, used for avatar links.
    pub oss_url: String,
    /// Push session parameters.
    pub pusher: PusherSettings,
    /// Retry policies per failure domain.
    pub retry: RetrySettings,
    /// Notify about unread conversations right after login.
    pub notify_unread: bool,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for KahlaSettings {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            oss_url: DEFAULT_OSS_URL.to_string(),
            pusher: PusherSettings::default(),
            retry: RetrySettings::default(),
            notify_unread: true,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

/// Push session parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PusherSettings {
    /// Seconds between heartbeat frames.
    pub heartbeat_interval_secs: u64,
    /// Milliseconds a graceful close waits for the peer's acknowledgment.
    pub close_grace_ms: u64,
    /// Capacity of the delivered-event channel.
    pub event_buffer: usize,
}

impl Default for PusherSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: HEARTBEAT_INTERVAL.as_secs(),
            close_grace_ms: u64::try_from(CLOSE_GRACE.as_millis()).unwrap_or(1000),
            event_buffer: EVENT_BUFFER,
        }
    }
}

impl PusherSettings {
    /// Heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Graceful close window.
    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Retry policies, one per failure domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    /// Password login.
    pub login: RetryConfig,
    /// Friend list fetch for the unread summary.
    pub friends: RetryConfig,
    /// Push channel setup (outer loop).
    pub init_pusher: RetryConfig,
    /// WebSocket connect (inner loop, per push channel).
    pub connect: RetryConfig,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            login: RetryConfig::default(),
            friends: RetryConfig::default(),
            init_pusher: RetryConfig::default().unbounded(),
            connect: RetryConfig {
                max_attempts: 5,
                ..RetryConfig::default()
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
