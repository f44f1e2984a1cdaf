//! Protocol constants shared across crates.

use std::time::Duration;

/// Default Kahla REST server.
pub const DEFAULT_SERVER_URL: &str = "https://server.kahla.app";

/// Default Kahla object storage server.
pub const DEFAULT_OSS_URL: &str = "https://oss.aiursoft.com";

/// Interval between client heartbeat frames.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);

/// How long a graceful close waits for the peer's close acknowledgment.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Default capacity of the delivered-event channel.
pub const EVENT_BUFFER: usize = 10;

/// Default capacity of the frame-fault channel.
pub const FAULT_BUFFER: usize = 16;

/// Suffix appended to every notification title.
pub const TITLE_SUFFIX: &str = "[Kahla]";
