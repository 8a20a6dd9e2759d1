//! Authenticated body encryption
//!
//! Same key split as the legacy codec (the six-digit key travels through the
//! gateway, the body travels openly) but the body is ChaCha20-Poly1305
//! ciphertext, so a wrong key or a tampered body is detected.
//!
//! Layout: `"sealed1:" || base64(nonce (12) || ciphertext || tag (16))`
//!
//! The prefix cannot occur in a legacy body (plain base64), so a reader can
//! tell the schemes apart without knowing the sender's settings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use super::keys::format_key;
use crate::error::CodecError;

/// Domain separator for body key derivation
const SEALED_SALT: &[u8] = b"PrivatePulse/sealed-body/v1";

/// Marks a body as sealed
pub const SEALED_PREFIX: &str = "sealed1:";

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under the numeric `key`
pub fn seal(plaintext: &str, key: u32) -> Result<String, CodecError> {
    let cipher = body_cipher(key)?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| CodecError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(format!("{}{}", SEALED_PREFIX, STANDARD.encode(out)))
}

/// Whether `body` carries the sealed-scheme tag
pub fn is_sealed(body: &str) -> bool {
    body.trim_start().starts_with(SEALED_PREFIX)
}

/// Decrypt and authenticate a sealed body
pub fn open(ciphertext: &str, key: u32) -> Result<String, CodecError> {
    let encoded = ciphertext
        .trim()
        .strip_prefix(SEALED_PREFIX)
        .ok_or_else(|| CodecError::InvalidEncoding("body is not tagged as sealed".into()))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CodecError::InvalidEncoding(e.to_string()))?;
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CodecError::Truncated(bytes.len()));
    }

    let (nonce, body) = bytes.split_at(NONCE_SIZE);
    let plaintext = body_cipher(key)?
        .decrypt(Nonce::from_slice(nonce), body)
        .map_err(|_| CodecError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| CodecError::AuthenticationFailed)
}

fn body_cipher(key: u32) -> Result<ChaCha20Poly1305, CodecError> {
    let hk = Hkdf::<Sha256>::new(Some(SEALED_SALT), format_key(i64::from(key)).as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(b"body-key", &mut okm)
        .map_err(|e| CodecError::EncryptionFailed(e.to_string()))?;
    ChaCha20Poly1305::new_from_slice(&okm).map_err(|e| CodecError::EncryptionFailed(e.to_string()))
}
