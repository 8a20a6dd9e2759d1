//! Message body codec
//!
//! The legacy scheme XORs the UTF-8 body with the repeated six-digit key and
//! base64-encodes the result. It is deterministic and carries no
//! authentication tag: decoding with the wrong key "succeeds" and returns
//! garbage, so callers that need integrity should use [`BodyScheme::Sealed`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::keys::format_key;
use super::sealed;
use crate::error::CodecError;

/// How a message body is turned into transport ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyScheme {
    /// Repeating-key XOR + base64 (wire compatible with existing messages)
    #[default]
    Xor,
    /// ChaCha20-Poly1305 under a key derived from the numeric key
    Sealed,
}

impl BodyScheme {
    /// Scheme a stored body was written with
    pub fn of(body: &str) -> Self {
        if sealed::is_sealed(body) {
            BodyScheme::Sealed
        } else {
            BodyScheme::Xor
        }
    }

    pub fn encrypt(&self, plaintext: &str, key: u32) -> Result<String, CodecError> {
        match self {
            BodyScheme::Xor => Ok(encode(plaintext, key)),
            BodyScheme::Sealed => sealed::seal(plaintext, key),
        }
    }

    pub fn decrypt(&self, ciphertext: &str, key: u32) -> Result<String, CodecError> {
        match self {
            BodyScheme::Xor => decode(ciphertext, key),
            BodyScheme::Sealed => sealed::open(ciphertext, key),
        }
    }
}

/// Encode a plaintext body under `key`
pub fn encode(plaintext: &str, key: u32) -> String {
    let key_bytes = format_key(i64::from(key));
    STANDARD.encode(xor_with_key(plaintext.as_bytes(), key_bytes.as_bytes()))
}

/// Decode a body back to text
///
/// Bytes that are not valid UTF-8 (the usual result of a wrong key) are
/// replaced with U+FFFD rather than rejected.
pub fn decode(ciphertext: &str, key: u32) -> Result<String, CodecError> {
    let bytes = decode_bytes(ciphertext, key)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a body to raw bytes
pub fn decode_bytes(ciphertext: &str, key: u32) -> Result<Vec<u8>, CodecError> {
    let key_bytes = format_key(i64::from(key));
    let encrypted = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| CodecError::InvalidEncoding(e.to_string()))?;
    Ok(xor_with_key(&encrypted, key_bytes.as_bytes()))
}

fn xor_with_key(data: &[u8], key_bytes: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key_bytes.iter().cycle())
        .map(|(d, k)| d ^ k)
        .collect()
}
