//! Error types for frame decoding and message decryption.
//!
//! Both are per-frame conditions: the session logs them and keeps the
//! connection open. Neither is ever raised as a panic.

use thiserror::Error;

/// Failure to turn a raw frame into an [`Event`](crate::Event).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not a JSON object with an integer `type` field.
    #[error("malformed event envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The `type` field does not name a known event.
    #[error("invalid event type: {0}")]
    InvalidEventType(i64),

    /// The `type` field is known but the rest of the frame does not match it.
    #[error("malformed {variant} payload: {source}")]
    MalformedPayload {
        /// Name of the variant the frame was parsed as.
        variant: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Short machine-readable tag for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::InvalidEventType(_) => "invalid_event_type",
            Self::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

/// Failure to decrypt a CryptoJS `Salted__` ciphertext.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// Input is not valid standard base64.
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes do not start with the `Salted__` marker.
    #[error("ciphertext does not start with the Salted__ marker")]
    MissingSaltMarker,

    /// Encrypted payload is empty or not a whole number of AES blocks.
    #[error("ciphertext length {len} is not a positive multiple of the block size")]
    InvalidLength {
        /// Length of the encrypted payload after the salt header.
        len: usize,
    },

    /// PKCS#7 padding check failed (usually a wrong passphrase).
    #[error("invalid PKCS#7 padding")]
    BadPadding,

    /// Decrypted bytes are not UTF-8.
    #[error("plaintext is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
