//! PrivatePulse - Core
//!
//! Encrypted inbox messaging where the body travels openly as ciphertext and
//! the key that opens it is held by a confidential-compute gateway.
//!
//! # Modules
//! - `ledger`: append-only message store with per-recipient inboxes
//! - `cipher`: envelope codec (body encoding, numeric keys)
//! - `gateway`: key handles, input proofs, decrypt authorizations
//! - `client`: send/read orchestration on top of a ledger and a gateway
//! - `account`, `time`, `error`: shared primitives

pub mod account;
pub mod cipher;
pub mod client;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod time;

#[cfg(feature = "python")]
mod python;

// Re-export common types
pub use account::{AccountId, Wallet};
pub use client::{ClientConfig, PulseClient, SendStage};
pub use error::{ClientError, CodecError, GatewayError, LedgerError, PulseError, PulseResult};
pub use gateway::{InputVerifier, KeyGateway, KeyHandle, LocalGateway};
pub use ledger::{Ledger, LedgerBackend, MessageRecord, MessageSent};
pub use time::{Clock, ManualClock, SystemClock};
