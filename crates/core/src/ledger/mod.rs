//! Message Ledger
//!
//! Append-only store of encrypted messages with two indexes: a global arena
//! ordered by id and a per-recipient inbox of ids in arrival order. Records
//! are created once by [`Ledger::send`] and never change afterwards.
//!
//! The ledger never sees a clear envelope key. Each send carries a gateway
//! handle plus an input proof, which the ledger checks through its
//! [`InputVerifier`] before anything is stored.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::AccountId;
use crate::error::LedgerError;
use crate::gateway::{InputVerifier, KeyHandle};
use crate::time::Clock;

/// A stored message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: u64,
    pub sender: AccountId,
    pub recipient: AccountId,
    /// Unix seconds, set by the ledger at insertion
    pub timestamp: u64,
    /// Envelope ciphertext, opaque to the ledger
    pub body: String,
    pub key_handle: KeyHandle,
}

/// Emitted once per successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSent {
    pub id: u64,
    pub sender: AccountId,
    pub recipient: AccountId,
    pub timestamp: u64,
    pub body: String,
}

/// Operations a client needs from a ledger, local or remote
pub trait LedgerBackend: Send + Sync {
    /// Address the gateway binds input proofs to
    fn address(&self) -> AccountId;

    fn send(
        &self,
        sender: &AccountId,
        recipient: &AccountId,
        body: String,
        key_handle: &KeyHandle,
        input_proof: &[u8],
    ) -> Result<u64, LedgerError>;

    fn inbox_count(&self, recipient: &AccountId) -> u64;

    fn inbox_message(&self, recipient: &AccountId, index: u64) -> Result<MessageRecord, LedgerError>;

    fn message(&self, id: u64) -> Result<MessageRecord, LedgerError>;

    fn total_messages(&self) -> u64;
}

#[derive(Debug, Default)]
struct LedgerState {
    messages: Vec<MessageRecord>,
    inboxes: HashMap<AccountId, Vec<u64>>,
    events: Vec<MessageSent>,
}

pub struct Ledger<V: InputVerifier> {
    address: AccountId,
    verifier: V,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
}

impl<V: InputVerifier> Ledger<V> {
    pub fn new(address: AccountId, verifier: V, clock: Arc<dyn Clock>) -> Self {
        Self {
            address,
            verifier,
            clock,
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn address(&self) -> AccountId {
        self.address
    }

    /// Protocol id of the confidential-compute layer behind the verifier
    pub fn confidential_protocol_id(&self) -> u64 {
        self.verifier.protocol_id()
    }

    /// Store a message for `recipient` and return its id
    ///
    /// The key handle must be attested by `input_proof` for
    /// `(self.address(), sender)`. On success the recipient and the ledger
    /// itself are granted permission to decrypt the handle. On any failure
    /// the ledger is left unchanged.
    pub fn send(
        &self,
        sender: &AccountId,
        recipient: &AccountId,
        body: String,
        key_handle: &KeyHandle,
        input_proof: &[u8],
    ) -> Result<u64, LedgerError> {
        if recipient.is_null() {
            warn!(%sender, "send rejected: null recipient");
            return Err(LedgerError::InvalidRecipient);
        }

        // Held across verification so ids are assigned in the order sends commit
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let handle = self
            .verifier
            .verify_input(key_handle, input_proof, &self.address, sender)
            .map_err(LedgerError::InvalidProof)?;
        self.verifier
            .allow_all(&handle, &[self.address, *recipient])
            .map_err(LedgerError::InvalidProof)?;

        let id = state.messages.len() as u64;
        let timestamp = self.clock.now();
        state.messages.push(MessageRecord {
            id,
            sender: *sender,
            recipient: *recipient,
            timestamp,
            body: body.clone(),
            key_handle: handle,
        });
        state.inboxes.entry(*recipient).or_default().push(id);
        state.events.push(MessageSent {
            id,
            sender: *sender,
            recipient: *recipient,
            timestamp,
            body,
        });

        info!(id, %sender, %recipient, "message stored");
        Ok(id)
    }

    /// Number of messages addressed to `recipient`
    pub fn inbox_count(&self, recipient: &AccountId) -> u64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.inboxes.get(recipient).map_or(0, |ids| ids.len() as u64)
    }

    /// The `index`-th message received by `recipient`, oldest first
    pub fn inbox_message(&self, recipient: &AccountId, index: u64) -> Result<MessageRecord, LedgerError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let ids = state.inboxes.get(recipient).map(Vec::as_slice).unwrap_or(&[]);
        let id = usize::try_from(index)
            .ok()
            .and_then(|i| ids.get(i))
            .ok_or(LedgerError::OutOfRange {
                index,
                count: ids.len() as u64,
            })?;

        debug!(%recipient, index, id, "inbox read");
        state
            .messages
            .get(*id as usize)
            .cloned()
            .ok_or(LedgerError::NotFound {
                id: *id,
                total: state.messages.len() as u64,
            })
    }

    /// Message by global id
    pub fn message(&self, id: u64) -> Result<MessageRecord, LedgerError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        usize::try_from(id)
            .ok()
            .and_then(|i| state.messages.get(i))
            .cloned()
            .ok_or(LedgerError::NotFound {
                id,
                total: state.messages.len() as u64,
            })
    }

    pub fn total_messages(&self) -> u64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.messages.len() as u64
    }

    /// Events with `id >= cursor`, in id order
    pub fn events_since(&self, cursor: u64) -> Vec<MessageSent> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(state.events.len());
        state.events[start..].to_vec()
    }
}

impl<V: InputVerifier> std::fmt::Debug for Ledger<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("address", &self.address)
            .field("total_messages", &self.total_messages())
            .finish_non_exhaustive()
    }
}

impl<V: InputVerifier> LedgerBackend for Ledger<V> {
    fn address(&self) -> AccountId {
        Ledger::address(self)
    }

    fn send(
        &self,
        sender: &AccountId,
        recipient: &AccountId,
        body: String,
        key_handle: &KeyHandle,
        input_proof: &[u8],
    ) -> Result<u64, LedgerError> {
        Ledger::send(self, sender, recipient, body, key_handle, input_proof)
    }

    fn inbox_count(&self, recipient: &AccountId) -> u64 {
        Ledger::inbox_count(self, recipient)
    }

    fn inbox_message(&self, recipient: &AccountId, index: u64) -> Result<MessageRecord, LedgerError> {
        Ledger::inbox_message(self, recipient, index)
    }

    fn message(&self, id: u64) -> Result<MessageRecord, LedgerError> {
        Ledger::message(self, id)
    }

    fn total_messages(&self) -> u64 {
        Ledger::total_messages(self)
    }
}

impl<L: LedgerBackend + ?Sized> LedgerBackend for Arc<L> {
    fn address(&self) -> AccountId {
        (**self).address()
    }

    fn send(
        &self,
        sender: &AccountId,
        recipient: &AccountId,
        body: String,
        key_handle: &KeyHandle,
        input_proof: &[u8],
    ) -> Result<u64, LedgerError> {
        (**self).send(sender, recipient, body, key_handle, input_proof)
    }

    fn inbox_count(&self, recipient: &AccountId) -> u64 {
        (**self).inbox_count(recipient)
    }

    fn inbox_message(&self, recipient: &AccountId, index: u64) -> Result<MessageRecord, LedgerError> {
        (**self).inbox_message(recipient, index)
    }

    fn message(&self, id: u64) -> Result<MessageRecord, LedgerError> {
        (**self).message(id)
    }

    fn total_messages(&self) -> u64 {
        (**self).total_messages()
    }
}
