//! Unified Error Types for PrivatePulse
//!
//! This module provides the error hierarchy shared by the ledger, the
//! envelope codec, the key gateway and the client orchestrator.

use thiserror::Error;

/// Top-level error type for PrivatePulse
#[derive(Error, Debug)]
pub enum PulseError {
    /// Message ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Envelope codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Key gateway error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Client orchestration error (message is user-facing)
    #[error("{0}")]
    Client(#[from] ClientError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for PrivatePulse operations
pub type PulseResult<T> = Result<T, PulseError>;

/// Errors from the message ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Recipient must not be the null account")]
    InvalidRecipient,

    #[error("Invalid key proof: {0}")]
    InvalidProof(#[source] GatewayError),

    #[error("Inbox index {index} out of range (inbox holds {count} messages)")]
    OutOfRange { index: u64, count: u64 },

    #[error("Message {id} not found (ledger holds {total} messages)")]
    NotFound { id: u64, total: u64 },
}

/// Errors from the envelope codec
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Ciphertext is not valid base64: {0}")]
    InvalidEncoding(String),

    #[error("Ciphertext too short: {0} bytes")]
    Truncated(usize),

    #[error("Authentication failed: wrong key or corrupted ciphertext")]
    AuthenticationFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Errors from the confidential key gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Input proof rejected: {0}")]
    InvalidProof(String),

    #[error("Requester is not authorized to decrypt this handle")]
    Unauthorized,

    #[error("Decrypt authorization is outside its validity window")]
    Expired,

    #[error("Malformed decrypt authorization: {0}")]
    InvalidAuthorization(String),

    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    #[error("Value does not fit the encrypted type: {0}")]
    ValueOutOfRange(u64),

    #[error("Transport encryption failed: {0}")]
    Transport(String),
}

/// Errors surfaced by the client orchestrator
///
/// The display strings are shown to users verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Recipient address is invalid.")]
    InvalidRecipient,

    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Message is too long ({len} bytes, limit {max}).")]
    MessageTooLong { len: usize, max: usize },

    #[error("Encryption service returned no handle.")]
    MissingHandle,

    #[error("Decrypted key is invalid.")]
    InvalidDecryptedKey,
}

impl From<serde_json::Error> for PulseError {
    fn from(err: serde_json::Error) -> Self {
        PulseError::Serialization(err.to_string())
    }
}

/// Input validation utilities
pub mod validation {
    use super::*;
    use crate::account::AccountId;
    use crate::cipher::MAX_KEY;

    /// Validate a textual account identifier (base58, 32 bytes)
    pub fn validate_account_id(text: &str) -> Result<AccountId, PulseError> {
        text.trim()
            .parse::<AccountId>()
            .map_err(|e| PulseError::InvalidInput(e.to_string()))
    }

    /// Validate a numeric envelope key (six decimal digits)
    pub fn validate_key(key: u64) -> Result<u32, PulseError> {
        if key > u64::from(MAX_KEY) {
            return Err(PulseError::InvalidInput(format!(
                "Key exceeds six digits: {} > {}",
                key, MAX_KEY
            )));
        }
        Ok(key as u32)
    }
}
