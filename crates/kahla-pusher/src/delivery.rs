//! What the session hands to its consumers.
//!
//! Every decoded frame becomes a [`PushEvent`]. `NewMessage` bodies are
//! decrypted on the way; a body that does not decrypt is still delivered,
//! carrying the raw ciphertext. Frames that do not decode become
//! [`FrameFault`]s on a separate channel.

use kahla_core::cryptojs;
use kahla_core::{DecodeError, DecryptError, Event};

/// Longest raw frame prefix kept in a [`FrameFault`].
pub const FAULT_EXCERPT_CHARS: usize = 256;

/// Body of a `NewMessage` event after decryption.
#[derive(Debug)]
pub enum MessageBody {
    /// Plaintext of the message.
    Decrypted(String),
    /// Decryption failed; the ciphertext is passed through.
    Undecryptable {
        /// Base64 ciphertext as received.
        ciphertext: String,
        /// Why decryption failed.
        reason: DecryptError,
    },
}

impl MessageBody {
    /// Decrypt `ciphertext` with `passphrase`, keeping the ciphertext on failure.
    pub fn decrypt(ciphertext: &str, passphrase: &str) -> Self {
        match cryptojs::decrypt(ciphertext, passphrase) {
            Ok(plain) => Self::Decrypted(plain),
            Err(reason) => Self::Undecryptable {
                ciphertext: ciphertext.to_string(),
                reason,
            },
        }
    }

    /// Text to show: the plaintext, or the raw ciphertext as a fallback.
    pub fn text(&self) -> &str {
        match self {
            Self::Decrypted(plain) => plain,
            Self::Undecryptable { ciphertext, .. } => ciphertext,
        }
    }

    /// Whether decryption succeeded.
    pub fn is_decrypted(&self) -> bool {
        matches!(self, Self::Decrypted(_))
    }
}

/// A decoded event ready for consumers.
#[derive(Debug)]
pub struct PushEvent {
    /// The decoded event.
    pub event: Event,
    /// Decrypted message body, present for `NewMessage` only.
    pub body: Option<MessageBody>,
}

impl PushEvent {
    /// Wrap a decoded event, decrypting its body when it carries one.
    pub fn from_event(event: Event) -> Self {
        let body = match &event {
            Event::NewMessage(message) => {
                Some(MessageBody::decrypt(&message.content, &message.aes_key))
            }
            _ => None,
        };
        Self { event, body }
    }
}

/// A frame that could not be decoded. The session stays open.
#[derive(Debug)]
pub struct FrameFault {
    /// Up to [`FAULT_EXCERPT_CHARS`] characters of the raw frame.
    pub excerpt: String,
    /// Why decoding failed.
    pub error: DecodeError,
}

impl FrameFault {
    pub(crate) fn new(raw: &str, error: DecodeError) -> Self {
        Self {
            excerpt: raw.chars().take(FAULT_EXCERPT_CHARS).collect(),
            error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
