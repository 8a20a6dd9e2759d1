//! Account identities
//!
//! Accounts are 32-byte ed25519 public keys, written in base58 the same way
//! Solana writes a `Pubkey`. A [`Wallet`] holds the matching signing key and
//! is what a client uses to sign decrypt authorizations.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Size of an account identifier in bytes
pub const ACCOUNT_ID_SIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Account id is not valid base58: {0}")]
    InvalidBase58(String),
    #[error("Account id must decode to 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Opaque account identifier (sender, recipient or ledger address)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId([u8; ACCOUNT_ID_SIZE]);

impl AccountId {
    /// The null account; never a valid recipient
    pub const NULL: AccountId = AccountId([0u8; ACCOUNT_ID_SIZE]);

    pub const fn new(bytes: [u8; ACCOUNT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; ACCOUNT_ID_SIZE] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_SIZE] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; ACCOUNT_ID_SIZE]
    }

    /// Verify an ed25519 signature made by this account
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(signature)).is_ok()
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AccountIdError::InvalidBase58(e.to_string()))?;
        let bytes: [u8; ACCOUNT_ID_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AccountIdError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Local signing wallet
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Generate a new random wallet using OS randomness
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Restore a wallet from its 32-byte secret seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// The account this wallet signs for
    pub fn account(&self) -> AccountId {
        AccountId(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("account", &self.account()).finish()
    }
}
