//! Session lifecycle states.

use std::fmt;

/// Lifecycle state of a [`PushSession`](crate::PushSession).
///
/// `New → Connected → (Disconnected → Connected)* → Closed`. `Closed` is
/// terminal and only reached through an interrupt or
/// [`close`](crate::PushSession::close).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection attempt has completed yet.
    #[default]
    New,
    /// A socket is open and the read loop is running.
    Connected,
    /// The last connection ended on a transport condition. Reconnect allowed.
    Disconnected,
    /// Shut down on request. No further connections are made.
    Closed,
}

impl SessionState {
    /// Stable lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }

    /// Whether the session has been shut down.
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_new() {
        assert_eq!(SessionState::default(), SessionState::New);
    }

    #[test]
    fn display_and_terminal() {
        assert_eq!(SessionState::Disconnected.to_string(), "disconnected");
        assert!(SessionState::Closed.is_closed());
        assert!(!SessionState::Connected.is_closed());
    }
}
