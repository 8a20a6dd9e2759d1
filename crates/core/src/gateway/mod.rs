//! Key Confidentiality Gateway
//!
//! The numeric envelope key never appears in clear on the ledger. The sender
//! hands it to the gateway, which returns an opaque [`KeyHandle`] plus an
//! input proof binding that handle to `(ledger, sender)`. The ledger checks
//! the proof and records permission grants; the recipient later proves their
//! identity with a signed [`UserDecryptRequest`] to get the value back.
//!
//! The boundary is split in two traits:
//! - [`InputVerifier`]: what the ledger needs (proof checks, ACL grants)
//! - [`KeyGateway`]: what a client needs (encrypt, authorize, decrypt)
//!
//! [`LocalGateway`] implements both in-process.

pub mod authorization;
pub mod local;
pub mod proof;
pub mod transport;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::account::AccountId;
use crate::error::GatewayError;

pub use authorization::{AuthorizationMessage, UserDecryptRequest, AUTHORIZATION_DOMAIN};
pub use local::LocalGateway;
pub use proof::{InputProof, INPUT_PROOF_DOMAIN};
pub use transport::{SealedValue, TransportKeypair};

/// Size of a key handle in bytes
pub const HANDLE_SIZE: usize = 32;

/// Opaque reference to a confidential value held by the gateway
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyHandle([u8; HANDLE_SIZE]);

impl KeyHandle {
    pub const fn new(bytes: [u8; HANDLE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, GatewayError> {
        let arr: [u8; HANDLE_SIZE] = bytes.try_into().map_err(|_| {
            GatewayError::UnknownHandle(format!("expected {} bytes, got {}", HANDLE_SIZE, bytes.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; HANDLE_SIZE] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; HANDLE_SIZE] {
        self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHandle({})", self)
    }
}

impl FromStr for KeyHandle {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| GatewayError::UnknownHandle(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for KeyHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Result of registering a confidential input with the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<KeyHandle>,
    /// Serialized [`InputProof`]
    pub input_proof: Vec<u8>,
}

/// A handle together with the ledger that holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: KeyHandle,
    pub contract: AccountId,
}

/// Ledger-side half of the gateway
pub trait InputVerifier: Send + Sync {
    /// Check that `proof` attests `handle` for `(contract, caller)`
    ///
    /// On success the contract holds permission on the returned handle for
    /// the rest of the operation.
    fn verify_input(
        &self,
        handle: &KeyHandle,
        proof: &[u8],
        contract: &AccountId,
        caller: &AccountId,
    ) -> Result<KeyHandle, GatewayError>;

    /// Grant `account` permission to decrypt `handle`
    fn allow(&self, handle: &KeyHandle, account: &AccountId) -> Result<(), GatewayError>;

    /// Grant every account in `accounts` permission on `handle`, or none of them
    fn allow_all(&self, handle: &KeyHandle, accounts: &[AccountId]) -> Result<(), GatewayError>;

    /// Identifier of the confidential-compute protocol in use
    fn protocol_id(&self) -> u64;
}

/// Client-side half of the gateway
pub trait KeyGateway: Send + Sync {
    /// Register `value` as a confidential input for `(contract, caller)`
    fn create_encrypted_input(
        &self,
        contract: &AccountId,
        caller: &AccountId,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError>;

    /// Build the unsigned authorization a requester signs to decrypt
    fn create_authorization(
        &self,
        public_key: [u8; 32],
        contracts: Vec<AccountId>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> AuthorizationMessage;

    /// Recover clear values for `pairs` on behalf of the signed request
    ///
    /// Values are re-encrypted to the request's transport key and opened
    /// with `transport`.
    fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        request: &UserDecryptRequest,
        transport: &TransportKeypair,
    ) -> Result<HashMap<KeyHandle, u64>, GatewayError>;
}

impl<T: InputVerifier + ?Sized> InputVerifier for Arc<T> {
    fn verify_input(
        &self,
        handle: &KeyHandle,
        proof: &[u8],
        contract: &AccountId,
        caller: &AccountId,
    ) -> Result<KeyHandle, GatewayError> {
        (**self).verify_input(handle, proof, contract, caller)
    }

    fn allow(&self, handle: &KeyHandle, account: &AccountId) -> Result<(), GatewayError> {
        (**self).allow(handle, account)
    }

    fn allow_all(&self, handle: &KeyHandle, accounts: &[AccountId]) -> Result<(), GatewayError> {
        (**self).allow_all(handle, accounts)
    }

    fn protocol_id(&self) -> u64 {
        (**self).protocol_id()
    }
}

impl<T: KeyGateway + ?Sized> KeyGateway for Arc<T> {
    fn create_encrypted_input(
        &self,
        contract: &AccountId,
        caller: &AccountId,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        (**self).create_encrypted_input(contract, caller, value)
    }

    fn create_authorization(
        &self,
        public_key: [u8; 32],
        contracts: Vec<AccountId>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> AuthorizationMessage {
        (**self).create_authorization(public_key, contracts, start_timestamp, duration_days)
    }

    fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        request: &UserDecryptRequest,
        transport: &TransportKeypair,
    ) -> Result<HashMap<KeyHandle, u64>, GatewayError> {
        (**self).user_decrypt(pairs, request, transport)
    }
}
