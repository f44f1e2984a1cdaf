//! # kahla-pusher
//!
//! WebSocket push session for Kahla.
//!
//! - [`PushSession`]: connect / heartbeat / graceful close state machine
//! - [`SessionState`]: `New`, `Connected`, `Disconnected`, `Closed`
//! - [`PushEvent`]: decoded events with decrypted message bodies
//! - [`Dialer`]: socket factory seam, [`TungsteniteDialer`] by default
//! - [`SessionObserver`]: injected lifecycle hooks, [`TracingObserver`] by default
//! - [`testing`]: in-memory sockets for tests of code built on a session

#![deny(unsafe_code)]

pub mod config;
pub mod delivery;
pub mod dialer;
pub mod errors;
pub mod observer;
mod read_loop;
pub mod session;
pub mod state;
pub mod testing;

pub use config::SessionConfig;
pub use delivery::{FrameFault, MessageBody, PushEvent};
pub use dialer::{Dialer, PushSocket, TungsteniteDialer};
pub use errors::PusherError;
pub use observer::{SessionObserver, TracingObserver};
pub use session::{PushSession, SessionChannels};
pub use state::SessionState;
