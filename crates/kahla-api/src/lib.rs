//! # kahla-api
//!
//! REST client for the Kahla chat server.
//!
//! Covers the three calls the notifier needs: password login, push channel
//! assignment and the friend list used for the unread summary. Responses are
//! checked for HTTP 200, then for a zero `code`, then decoded.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod types;

pub use client::KahlaApi;
pub use errors::{ApiError, Result};
pub use types::{FriendSummary, InitPusherResponse, avatar_url};
