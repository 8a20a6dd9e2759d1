//! Client Read/Send Orchestrator
//!
//! Drives the two user flows against a ledger and a gateway:
//!
//! - send: validate, pick a fresh key, encode the body, register the key with
//!   the gateway, submit body + handle + proof to the ledger
//! - read: list the inbox newest first, then per entry authorize, recover the
//!   key through the gateway and decode the body

pub mod config;

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::{AccountId, Wallet};
use crate::cipher::{generate_key, BodyScheme};
use crate::error::{validation, ClientError, PulseResult};
use crate::gateway::{HandleContractPair, KeyGateway, TransportKeypair};
use crate::ledger::{LedgerBackend, MessageRecord};
use crate::time::Clock;

pub use config::ClientConfig;

/// Progress of the most recent send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStage {
    #[default]
    Idle,
    Encrypting,
    Confirming,
    Sent,
    Error,
}

/// Outcome of a successful send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: u64,
    /// Envelope key the body was encoded under
    pub key: u32,
}

/// A message in the caller's inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    /// Position in the inbox, 0 = oldest
    pub inbox_index: u64,
    pub record: MessageRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedMessage {
    pub key: u32,
    pub plaintext: String,
}

pub struct PulseClient<L: LedgerBackend, G: KeyGateway> {
    config: ClientConfig,
    ledger: L,
    gateway: G,
    wallet: Wallet,
    clock: Arc<dyn Clock>,
    stage: Mutex<SendStage>,
}

impl<L: LedgerBackend, G: KeyGateway> PulseClient<L, G> {
    pub fn new(
        config: ClientConfig,
        ledger: L,
        gateway: G,
        wallet: Wallet,
        clock: Arc<dyn Clock>,
    ) -> PulseResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ledger,
            gateway,
            wallet,
            clock,
            stage: Mutex::new(SendStage::Idle),
        })
    }

    pub fn account(&self) -> AccountId {
        self.wallet.account()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stage(&self) -> SendStage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn total_messages(&self) -> u64 {
        self.ledger.total_messages()
    }

    /// Send `message` to the account named by `recipient`
    ///
    /// Input errors are reported before anything is encrypted and leave the
    /// stage as it was. Failures after that point set the stage to
    /// [`SendStage::Error`].
    pub fn send(&self, recipient: &str, message: &str) -> PulseResult<SendReceipt> {
        let recipient = validation::validate_account_id(recipient)
            .map_err(|_| ClientError::InvalidRecipient)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::EmptyMessage.into());
        }

        let result = self.encrypt_and_submit(&recipient, message);
        match &result {
            Ok(receipt) => {
                self.set_stage(SendStage::Sent);
                info!(id = receipt.id, %recipient, "message sent");
            }
            Err(err) => {
                self.set_stage(SendStage::Error);
                warn!(%recipient, error = %err, "send failed");
            }
        }
        result
    }

    /// Inbox of the client's account, newest first
    pub fn inbox(&self) -> PulseResult<Vec<InboxEntry>> {
        let me = self.account();
        let count = self.ledger.inbox_count(&me);
        let mut entries = (0..count)
            .map(|inbox_index| -> PulseResult<InboxEntry> {
                let record = self.ledger.inbox_message(&me, inbox_index)?;
                Ok(InboxEntry { inbox_index, record })
            })
            .collect::<PulseResult<Vec<_>>>()?;
        entries.reverse();
        debug!(account = %me, count, "inbox loaded");
        Ok(entries)
    }

    /// Recover the key for `entry` and decode its body
    pub fn decrypt(&self, entry: &InboxEntry) -> PulseResult<DecryptedMessage> {
        let record = &entry.record;
        let contract = self.contract();
        let transport = TransportKeypair::generate();

        let request = self
            .gateway
            .create_authorization(
                transport.public_key(),
                vec![contract],
                self.clock.now(),
                self.config.decrypt_window_days,
            )
            .sign(&self.wallet);

        let values = self.gateway.user_decrypt(
            &[HandleContractPair {
                handle: record.key_handle,
                contract,
            }],
            &request,
            &transport,
        )?;

        let key = values
            .get(&record.key_handle)
            .copied()
            .ok_or(ClientError::InvalidDecryptedKey)
            .and_then(|v| validation::validate_key(v).map_err(|_| ClientError::InvalidDecryptedKey))?;
        // The reader's own scheme setting only governs what it sends
        let plaintext = BodyScheme::of(&record.body).decrypt(&record.body, key)?;

        debug!(id = record.id, inbox_index = entry.inbox_index, "message decrypted");
        Ok(DecryptedMessage { key, plaintext })
    }

    fn encrypt_and_submit(&self, recipient: &AccountId, message: &str) -> PulseResult<SendReceipt> {
        self.set_stage(SendStage::Encrypting);
        let contract = self.contract();
        let sender = self.account();

        let key = generate_key();
        let body = self.config.body_scheme.encrypt(message, key)?;
        if body.len() > self.config.max_body_len {
            return Err(ClientError::MessageTooLong {
                len: body.len(),
                max: self.config.max_body_len,
            }
            .into());
        }

        let input = self
            .gateway
            .create_encrypted_input(&contract, &sender, u64::from(key))?;
        let handle = input.handles.first().copied().ok_or(ClientError::MissingHandle)?;

        self.set_stage(SendStage::Confirming);
        let id = self
            .ledger
            .send(&sender, recipient, body, &handle, &input.input_proof)?;
        Ok(SendReceipt { id, key })
    }

    fn contract(&self) -> AccountId {
        if self.config.ledger_address.is_null() {
            self.ledger.address()
        } else {
            self.config.ledger_address
        }
    }

    fn set_stage(&self, stage: SendStage) {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
    }
}

impl<L: LedgerBackend, G: KeyGateway> std::fmt::Debug for PulseClient<L, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseClient")
            .field("account", &self.account())
            .field("config", &self.config)
            .field("stage", &self.stage())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{encode, SEALED_PREFIX};
    use crate::error::{GatewayError, LedgerError, PulseError};
    use crate::gateway::LocalGateway;
    use crate::ledger::Ledger;
    use crate::time::ManualClock;

    const LEDGER: AccountId = AccountId::new([0x22; 32]);

    type TestClient = PulseClient<Arc<Ledger<Arc<LocalGateway>>>, Arc<LocalGateway>>;

    struct World {
        clock: Arc<ManualClock>,
        gateway: Arc<LocalGateway>,
        ledger: Arc<Ledger<Arc<LocalGateway>>>,
    }

    impl World {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(1_700_000_000));
            let gateway = Arc::new(LocalGateway::with_verifier(Wallet::from_seed(&[1u8; 32]), clock.clone()));
            let ledger = Arc::new(Ledger::new(LEDGER, gateway.clone(), clock.clone()));
            Self { clock, gateway, ledger }
        }

        fn client(&self, seed: u8, config: ClientConfig) -> TestClient {
            PulseClient::new(
                config,
                self.ledger.clone(),
                self.gateway.clone(),
                Wallet::from_seed(&[seed; 32]),
                self.clock.clone(),
            )
            .unwrap()
        }
    }

    #[test]
    fn test_send_then_decrypt() {
        let world = World::new();
        let alice = world.client(10, ClientConfig::default());
        let bob = world.client(11, ClientConfig::default());

        let receipt = alice.send(&bob.account().to_string(), "  hello bob  ").unwrap();
        assert_eq!(alice.stage(), SendStage::Sent);
        assert_eq!(receipt.id, 0);

        let inbox = bob.inbox().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].record.body, encode("hello bob", receipt.key));

        let decrypted = bob.decrypt(&inbox[0]).unwrap();
        assert_eq!(decrypted.key, receipt.key);
        assert_eq!(decrypted.plaintext, "hello bob");
    }

    #[test]
    fn test_inbox_newest_first() {
        let world = World::new();
        let alice = world.client(10, ClientConfig::default());
        let bob = world.client(11, ClientConfig::default());
        let to = bob.account().to_string();

        for text in ["first", "second", "third"] {
            alice.send(&to, text).unwrap();
            world.clock.advance(60);
        }

        let inbox = bob.inbox().unwrap();
        let indexes: Vec<u64> = inbox.iter().map(|e| e.inbox_index).collect();
        assert_eq!(indexes, vec![2, 1, 0]);
        assert_eq!(bob.decrypt(&inbox[0]).unwrap().plaintext, "third");
        assert_eq!(bob.decrypt(&inbox[2]).unwrap().plaintext, "first");
        assert!(alice.inbox().unwrap().is_empty());
    }

    #[test]
    fn test_input_errors_are_verbatim() {
        let world = World::new();
        let alice = world.client(10, ClientConfig::default());

        let err = alice.send("not-an-address", "hi").unwrap_err();
        assert_eq!(err.to_string(), "Recipient address is invalid.");

        let err = alice.send(&LEDGER.to_string(), "   ").unwrap_err();
        assert_eq!(err.to_string(), "Message cannot be empty.");

        assert_eq!(alice.stage(), SendStage::Idle);
        assert_eq!(alice.total_messages(), 0);
    }

    #[test]
    fn test_failed_submit_sets_error_stage() {
        let world = World::new();
        let alice = world.client(10, ClientConfig::default());

        let err = alice.send(&AccountId::NULL.to_string(), "hi").unwrap_err();
        assert!(matches!(err, PulseError::Ledger(LedgerError::InvalidRecipient)));
        assert_eq!(alice.stage(), SendStage::Error);

        // Next success clears it
        alice.send(&LEDGER.to_string(), "hi").unwrap();
        assert_eq!(alice.stage(), SendStage::Sent);
    }

    #[test]
    fn test_wrong_ledger_address_fails_proof() {
        let world = World::new();
        let config = ClientConfig {
            ledger_address: AccountId::new([0x99; 32]),
            ..ClientConfig::default()
        };
        let alice = world.client(10, config);
        let err = alice.send(&LEDGER.to_string(), "hi").unwrap_err();
        assert!(matches!(err, PulseError::Ledger(LedgerError::InvalidProof(_))));
        assert_eq!(alice.stage(), SendStage::Error);
    }

    #[test]
    fn test_message_too_long() {
        let world = World::new();
        let config = ClientConfig {
            max_body_len: 8,
            ..ClientConfig::default()
        };
        let alice = world.client(10, config);
        let err = alice.send(&LEDGER.to_string(), "this will not fit").unwrap_err();
        assert!(matches!(err, PulseError::Client(ClientError::MessageTooLong { max: 8, .. })));
        assert_eq!(alice.stage(), SendStage::Error);
    }

    #[test]
    fn test_non_recipient_cannot_decrypt() {
        let world = World::new();
        let alice = world.client(10, ClientConfig::default());
        let bob = world.client(11, ClientConfig::default());
        let eve = world.client(12, ClientConfig::default());

        alice.send(&bob.account().to_string(), "for bob").unwrap();
        let entry = bob.inbox().unwrap().remove(0);

        let err = eve.decrypt(&entry).unwrap_err();
        assert!(matches!(err, PulseError::Gateway(GatewayError::Unauthorized)));
        // The sender is not on the ACL either
        assert!(matches!(
            alice.decrypt(&entry),
            Err(PulseError::Gateway(GatewayError::Unauthorized))
        ));
    }

    #[test]
    fn test_sealed_scheme() {
        let world = World::new();
        let config = ClientConfig {
            body_scheme: BodyScheme::Sealed,
            ..ClientConfig::default()
        };
        let alice = world.client(10, config.clone());
        let bob = world.client(11, config);

        alice.send(&bob.account().to_string(), "sealed hello").unwrap();
        let entry = bob.inbox().unwrap().remove(0);
        assert!(entry.record.body.starts_with(SEALED_PREFIX));
        assert_eq!(bob.decrypt(&entry).unwrap().plaintext, "sealed hello");
    }

    #[test]
    fn test_mixed_schemes_between_sender_and_reader() {
        let world = World::new();
        let sealed = ClientConfig {
            body_scheme: BodyScheme::Sealed,
            ..ClientConfig::default()
        };
        let alice = world.client(10, sealed.clone());
        let bob = world.client(11, ClientConfig::default());

        // Sealed sender, default reader
        alice.send(&bob.account().to_string(), "hello bob").unwrap();
        let entry = bob.inbox().unwrap().remove(0);
        assert_eq!(bob.decrypt(&entry).unwrap().plaintext, "hello bob");

        // Default sender, sealed reader
        bob.send(&alice.account().to_string(), "hello alice").unwrap();
        let entry = alice.inbox().unwrap().remove(0);
        assert_eq!(alice.decrypt(&entry).unwrap().plaintext, "hello alice");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let world = World::new();
        let config = ClientConfig {
            decrypt_window_days: 0,
            ..ClientConfig::default()
        };
        let result = PulseClient::new(
            config,
            world.ledger.clone(),
            world.gateway.clone(),
            Wallet::from_seed(&[1u8; 32]),
            world.clock.clone(),
        );
        assert!(matches!(result, Err(PulseError::Configuration(_))));
    }
}
