//! CryptoJS-compatible passphrase AES.
//!
//! Message bodies are produced by `CryptoJS.AES.encrypt(text, passphrase)`,
//! whose output is the OpenSSL `enc` format:
//!
//! ```text
//! base64( "Salted__" | salt[8] | AES-256-CBC(key, iv, PKCS#7(text)) )
//! ```
//!
//! `key` and `iv` come from `EVP_BytesToKey` with MD5 and one iteration:
//! `D_i = MD5(D_{i-1} | passphrase | salt)`, concatenated until 48 bytes are
//! available. This is an interop contract, every byte has to match.

use aes::Aes256;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};

use crate::errors::DecryptError;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Header that prefixes every salted ciphertext.
pub const SALT_MARKER: &[u8; 8] = b"Salted__";
/// Salt length in bytes.
pub const SALT_LEN: usize = 8;
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// CBC IV length in bytes.
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

/// Derive the AES key and IV from a passphrase and salt (`EVP_BytesToKey`, MD5, 1 round).
pub fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material: Vec<u8> = Vec::with_capacity(KEY_LEN + IV_LEN + BLOCK_LEN);
    let mut previous: Vec<u8> = Vec::new();
    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

/// Decrypt a base64 `Salted__` ciphertext with its passphrase.
pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String, DecryptError> {
    let raw = STANDARD.decode(ciphertext.trim())?;
    let rest = raw
        .strip_prefix(SALT_MARKER.as_slice())
        .ok_or(DecryptError::MissingSaltMarker)?;
    let (salt, body) = rest
        .split_at_checked(SALT_LEN)
        .ok_or(DecryptError::InvalidLength { len: 0 })?;
    if body.is_empty() || body.len() % BLOCK_LEN != 0 {
        return Err(DecryptError::InvalidLength { len: body.len() });
    }

    let (key, iv) = derive_key_iv(passphrase.as_bytes(), salt);
    let plain = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| DecryptError::BadPadding)?;
    Ok(String::from_utf8(plain)?)
}

/// Encrypt with an explicit salt. Output is byte-identical to CryptoJS for the same salt.
pub fn encrypt_with_salt(plaintext: &str, passphrase: &str, salt: [u8; SALT_LEN]) -> String {
    let (key, iv) = derive_key_iv(passphrase.as_bytes(), &salt);
    let body = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut out = Vec::with_capacity(SALT_MARKER.len() + SALT_LEN + body.len());
    out.extend_from_slice(SALT_MARKER);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&body);
    STANDARD.encode(out)
}

/// Encrypt with a fresh random salt.
pub fn encrypt(plaintext: &str, passphrase: &str) -> String {
    encrypt_with_salt(plaintext, passphrase, rand::random())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
