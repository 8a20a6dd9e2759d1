//! In-process gateway
//!
//! Holds clear values in memory behind an input-verifier key. Suitable for
//! tests, simulations and single-process deployments; it provides the same
//! access rules as a remote co-processor but none of its confidentiality
//! against the host.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::authorization::AuthorizationMessage;
use super::proof::InputProof;
use super::transport::{seal_value, SealedValue, TransportKeypair};
use super::{
    EncryptedInput, HandleContractPair, InputVerifier, KeyGateway, KeyHandle, UserDecryptRequest,
};
use crate::account::{AccountId, Wallet};
use crate::error::GatewayError;
use crate::time::{Clock, SystemClock};

/// Protocol id reported by the in-process gateway
pub const LOCAL_PROTOCOL_ID: u64 = 1;

const HANDLE_CONTEXT: &str = "PrivatePulse 2024 local gateway handle v1";

#[derive(Debug)]
struct StoredValue {
    value: u32,
    contract: AccountId,
    acl: HashSet<AccountId>,
}

#[derive(Debug, Default)]
struct GatewayState {
    values: HashMap<KeyHandle, StoredValue>,
    next_nonce: u64,
}

pub struct LocalGateway {
    verifier: Wallet,
    clock: Arc<dyn Clock>,
    protocol_id: u64,
    state: RwLock<GatewayState>,
}

impl LocalGateway {
    /// Gateway with a fresh verifier key and the wall clock
    pub fn new() -> Self {
        Self::with_verifier(Wallet::generate(), Arc::new(SystemClock))
    }

    pub fn with_verifier(verifier: Wallet, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifier,
            clock,
            protocol_id: LOCAL_PROTOCOL_ID,
            state: RwLock::new(GatewayState::default()),
        }
    }

    pub fn with_protocol_id(mut self, protocol_id: u64) -> Self {
        self.protocol_id = protocol_id;
        self
    }

    /// Public half of the input-verifier key, as registered on-chain
    pub fn verifier_key(&self) -> AccountId {
        self.verifier.account()
    }

    /// Whether `account` may decrypt `handle`
    pub fn is_allowed(&self, handle: &KeyHandle, account: &AccountId) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .values
            .get(handle)
            .map(|stored| stored.acl.contains(account))
            .unwrap_or(false)
    }

    /// Check `request` and seal each requested value to its transport key
    pub fn reencrypt(
        &self,
        pairs: &[HandleContractPair],
        request: &UserDecryptRequest,
    ) -> Result<Vec<(KeyHandle, SealedValue)>, GatewayError> {
        let now = self.clock.now();
        if let Err(err) = request.verify(now) {
            warn!(requester = %request.requester, error = %err, "decrypt authorization rejected");
            return Err(err);
        }

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if !request.message.covers(&pair.contract) {
                warn!(requester = %request.requester, contract = %pair.contract, "contract not covered by authorization");
                return Err(GatewayError::Unauthorized);
            }
            let stored = state
                .values
                .get(&pair.handle)
                .ok_or_else(|| GatewayError::UnknownHandle(pair.handle.to_string()))?;
            if stored.contract != pair.contract || !stored.acl.contains(&request.requester) {
                warn!(requester = %request.requester, handle = %pair.handle, "requester lacks permission");
                return Err(GatewayError::Unauthorized);
            }
            out.push((
                pair.handle,
                seal_value(&request.message.public_key, u64::from(stored.value))?,
            ));
        }

        debug!(requester = %request.requester, count = out.len(), "values re-encrypted");
        Ok(out)
    }

    fn derive_handle(&self, contract: &AccountId, caller: &AccountId, nonce: u64) -> KeyHandle {
        let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
        hasher.update(self.verifier.account().as_bytes());
        hasher.update(contract.as_bytes());
        hasher.update(caller.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        KeyHandle::new(*hasher.finalize().as_bytes())
    }
}

impl Default for LocalGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGateway")
            .field("verifier", &self.verifier.account())
            .field("protocol_id", &self.protocol_id)
            .finish_non_exhaustive()
    }
}

impl InputVerifier for LocalGateway {
    fn verify_input(
        &self,
        handle: &KeyHandle,
        proof: &[u8],
        contract: &AccountId,
        caller: &AccountId,
    ) -> Result<KeyHandle, GatewayError> {
        let checked = InputProof::from_bytes(proof).and_then(|proof| {
            if !proof.attests(handle) {
                return Err(GatewayError::InvalidProof("handle not attested by proof".into()));
            }
            proof.verify(&self.verifier.account(), contract, caller)
        });
        if let Err(err) = checked {
            warn!(%handle, %caller, error = %err, "input proof rejected");
            return Err(err);
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let stored = state
            .values
            .get_mut(handle)
            .ok_or_else(|| GatewayError::UnknownHandle(handle.to_string()))?;
        stored.acl.insert(*contract);

        debug!(%handle, %contract, %caller, "input proof accepted");
        Ok(*handle)
    }

    fn allow(&self, handle: &KeyHandle, account: &AccountId) -> Result<(), GatewayError> {
        self.allow_all(handle, std::slice::from_ref(account))
    }

    fn allow_all(&self, handle: &KeyHandle, accounts: &[AccountId]) -> Result<(), GatewayError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let stored = state
            .values
            .get_mut(handle)
            .ok_or_else(|| GatewayError::UnknownHandle(handle.to_string()))?;
        stored.acl.extend(accounts.iter().copied());
        debug!(%handle, count = accounts.len(), "permissions granted");
        Ok(())
    }

    fn protocol_id(&self) -> u64 {
        self.protocol_id
    }
}

impl KeyGateway for LocalGateway {
    fn create_encrypted_input(
        &self,
        contract: &AccountId,
        caller: &AccountId,
        value: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        let value = u32::try_from(value).map_err(|_| GatewayError::ValueOutOfRange(value))?;

        let handle = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let nonce = state.next_nonce;
            state.next_nonce += 1;
            let handle = self.derive_handle(contract, caller, nonce);
            state.values.insert(
                handle,
                StoredValue {
                    value,
                    contract: *contract,
                    acl: HashSet::new(),
                },
            );
            handle
        };

        let handles = vec![handle];
        let signature = self
            .verifier
            .sign(&InputProof::digest(contract, caller, &handles));
        let proof = InputProof {
            handles: handles.clone(),
            signature,
        };

        debug!(%handle, %contract, %caller, "encrypted input created");
        Ok(EncryptedInput {
            handles,
            input_proof: proof.to_bytes()?,
        })
    }

    fn create_authorization(
        &self,
        public_key: [u8; 32],
        contracts: Vec<AccountId>,
        start_timestamp: u64,
        duration_days: u64,
    ) -> AuthorizationMessage {
        AuthorizationMessage::new(public_key, contracts, start_timestamp, duration_days)
    }

    fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        request: &UserDecryptRequest,
        transport: &TransportKeypair,
    ) -> Result<HashMap<KeyHandle, u64>, GatewayError> {
        self.reencrypt(pairs, request)?
            .into_iter()
            .map(|(handle, sealed)| Ok((handle, transport.open(&sealed)?)))
            .collect()
    }
}
