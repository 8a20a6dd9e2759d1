//! Signed decrypt authorizations
//!
//! A requester asks the gateway for clear values by signing an
//! [`AuthorizationMessage`] with their wallet. The message names the transport
//! key the response is sealed to, the ledgers it applies to and a validity
//! window in whole days.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::account::{AccountId, Wallet};
use crate::error::GatewayError;

/// Domain string every authorization must carry
pub const AUTHORIZATION_DOMAIN: &str = "PrivatePulse/user-decrypt/v1";

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Longest validity window a requester may ask for
pub const MAX_DURATION_DAYS: u64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    pub domain: String,
    /// Transport public key the response is sealed to
    pub public_key: [u8; 32],
    pub contract_addresses: Vec<AccountId>,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl AuthorizationMessage {
    pub fn new(
        public_key: [u8; 32],
        contract_addresses: Vec<AccountId>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        Self {
            domain: AUTHORIZATION_DOMAIN.to_string(),
            public_key,
            contract_addresses,
            start_timestamp,
            duration_days,
        }
    }

    /// Digest the requester signs
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.domain.len() as u64).to_le_bytes());
        hasher.update(self.domain.as_bytes());
        hasher.update(self.public_key);
        hasher.update((self.contract_addresses.len() as u64).to_le_bytes());
        for contract in &self.contract_addresses {
            hasher.update(contract.as_bytes());
        }
        hasher.update(self.start_timestamp.to_le_bytes());
        hasher.update(self.duration_days.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn sign(self, wallet: &Wallet) -> UserDecryptRequest {
        let signature = wallet.sign(&self.signing_digest()).to_vec();
        UserDecryptRequest {
            message: self,
            requester: wallet.account(),
            signature,
        }
    }

    /// End of the validity window (exclusive)
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        self.start_timestamp <= now && now < self.expires_at()
    }

    pub fn covers(&self, contract: &AccountId) -> bool {
        self.contract_addresses.contains(contract)
    }

    fn check_shape(&self) -> Result<(), GatewayError> {
        if self.domain != AUTHORIZATION_DOMAIN {
            return Err(GatewayError::InvalidAuthorization(format!(
                "unexpected domain {:?}",
                self.domain
            )));
        }
        if !(1..=MAX_DURATION_DAYS).contains(&self.duration_days) {
            return Err(GatewayError::InvalidAuthorization(format!(
                "duration must be 1..={} days, got {}",
                MAX_DURATION_DAYS, self.duration_days
            )));
        }
        if self.contract_addresses.is_empty() {
            return Err(GatewayError::InvalidAuthorization("no contracts listed".into()));
        }
        Ok(())
    }
}

/// An authorization signed by the requester's wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptRequest {
    pub message: AuthorizationMessage,
    pub requester: AccountId,
    pub signature: Vec<u8>,
}

impl UserDecryptRequest {
    /// Check shape, signature and validity window at `now`
    ///
    /// Per-handle checks (contract coverage, ACL) are the gateway's job.
    pub fn verify(&self, now: u64) -> Result<(), GatewayError> {
        self.message.check_shape()?;

        let signature: &[u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| GatewayError::Unauthorized)?;
        if !self.requester.verify(&self.message.signing_digest(), signature) {
            return Err(GatewayError::Unauthorized);
        }

        if !self.message.is_valid_at(now) {
            return Err(GatewayError::Expired);
        }
        Ok(())
    }
}
