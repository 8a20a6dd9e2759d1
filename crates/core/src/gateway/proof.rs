//! Input proofs
//!
//! An input proof attests that a set of handles was produced by the gateway
//! for a specific `(contract, caller)` pair. Wire layout:
//!
//! ```text
//! [n: u8][n x 32-byte handle][64-byte ed25519 signature]
//! ```
//!
//! The signature is made by the gateway's input-verifier key over
//! `sha256(INPUT_PROOF_DOMAIN || contract || caller || handles)`. The on-chain
//! program parses and checks the same layout.

use sha2::{Digest, Sha256};

use super::{KeyHandle, HANDLE_SIZE};
use crate::account::AccountId;
use crate::error::GatewayError;

/// Domain separator for input-proof digests
pub const INPUT_PROOF_DOMAIN: &[u8] = b"PrivatePulse/input-proof/v1";

pub const SIGNATURE_SIZE: usize = 64;

/// Most handles a single proof can attest
pub const MAX_PROOF_HANDLES: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProof {
    pub handles: Vec<KeyHandle>,
    pub signature: [u8; SIGNATURE_SIZE],
}

impl InputProof {
    /// Digest the verifier signs for `(contract, caller, handles)`
    pub fn digest(contract: &AccountId, caller: &AccountId, handles: &[KeyHandle]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(INPUT_PROOF_DOMAIN);
        hasher.update(contract.as_bytes());
        hasher.update(caller.as_bytes());
        for handle in handles {
            hasher.update(handle.as_bytes());
        }
        hasher.finalize().into()
    }

    /// Wire form; fails when the handle count does not fit the one-byte header
    pub fn to_bytes(&self) -> Result<Vec<u8>, GatewayError> {
        let count = u8::try_from(self.handles.len()).map_err(|_| {
            GatewayError::InvalidProof(format!(
                "{} handles exceed the limit of {}",
                self.handles.len(),
                MAX_PROOF_HANDLES
            ))
        })?;
        let mut out = Vec::with_capacity(1 + self.handles.len() * HANDLE_SIZE + SIGNATURE_SIZE);
        out.push(count);
        for handle in &self.handles {
            out.extend_from_slice(handle.as_bytes());
        }
        out.extend_from_slice(&self.signature);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GatewayError> {
        let (&count, rest) = bytes
            .split_first()
            .ok_or_else(|| GatewayError::InvalidProof("empty proof".into()))?;
        let count = count as usize;
        let expected = count * HANDLE_SIZE + SIGNATURE_SIZE;
        if rest.len() != expected {
            return Err(GatewayError::InvalidProof(format!(
                "expected {} bytes after header, got {}",
                expected,
                rest.len()
            )));
        }
        if count == 0 {
            return Err(GatewayError::InvalidProof("proof attests no handles".into()));
        }

        let (handle_bytes, sig_bytes) = rest.split_at(count * HANDLE_SIZE);
        let handles = handle_bytes
            .chunks_exact(HANDLE_SIZE)
            .map(KeyHandle::from_slice)
            .collect::<Result<Vec<_>, _>>()?;
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(sig_bytes);

        Ok(Self { handles, signature })
    }

    pub fn attests(&self, handle: &KeyHandle) -> bool {
        self.handles.contains(handle)
    }

    /// Check the signature against `verifier` for `(contract, caller)`
    pub fn verify(
        &self,
        verifier: &AccountId,
        contract: &AccountId,
        caller: &AccountId,
    ) -> Result<(), GatewayError> {
        let digest = Self::digest(contract, caller, &self.handles);
        if verifier.verify(&digest, &self.signature) {
            Ok(())
        } else {
            Err(GatewayError::InvalidProof(
                "signature does not match contract and caller".into(),
            ))
        }
    }
}
