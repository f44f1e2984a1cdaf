//! # kahla-notify
//!
//! Desktop-side notifier for the Kahla chat service.
//!
//! - [`Client`]: login, unread summary and the resilient push loop
//! - [`Notifier`]: where notifications go, [`LogNotifier`] by default
//! - [`notification_for`]: what each push event looks like as a notification
//! - [`RunError`]: why a run stopped

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod notifier;

pub use client::{Client, session_config};
pub use errors::{NotifyError, RunError};
pub use notifier::{LogNotifier, Notification, Notifier, notification_for, unread_notification};
