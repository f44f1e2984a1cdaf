//! # kahla-core
//!
//! Foundation types for the Kahla push pipeline.
//!
//! - **Events**: the [`Event`] sum type and its two-pass wire decoder
//! - **Users**: [`KahlaUser`], the identity embedded in most events
//! - **CryptoJS**: decryption of `Salted__` AES-256-CBC message bodies
//! - **Retry**: the async, composable [`retry`](retry::retry) driver
//! - **Errors**: [`DecodeError`] and [`DecryptError`] via `thiserror`

#![deny(unsafe_code)]

pub mod constants;
pub mod cryptojs;
pub mod errors;
pub mod events;
pub mod retry;

pub use errors::{DecodeError, DecryptError};
pub use events::{Event, EventKind, KahlaUser, decode_event, encode_event};
