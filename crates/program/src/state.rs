//! Program state
//!
//! On-chain layout of the message ledger. Messages live in one PDA each,
//! addressed by global id. Each recipient has an `Inbox` counter PDA and one
//! `InboxEntry` PDA per received message pointing back at the global id, so
//! both "n-th message overall" and "n-th message for X" are a single
//! derivation away.

use anchor_lang::prelude::*;

use crate::instructions::MAX_BODY_LEN;

pub const LEDGER_SEED: &[u8] = b"ledger";
pub const MESSAGE_SEED: &[u8] = b"message";
pub const INBOX_SEED: &[u8] = b"inbox";
pub const INBOX_ENTRY_SEED: &[u8] = b"inbox_entry";

/// Anchor account discriminator
pub const DISCRIMINATOR_SIZE: usize = 8;

/// Ledger singleton
#[account]
#[derive(Debug)]
pub struct MessageLedger {
    /// Account that initialized the ledger
    pub authority: Pubkey,

    /// Gateway key whose signatures make input proofs valid
    pub input_verifier: Pubkey,

    /// Messages created so far; also the next message id
    pub total_messages: u64,

    pub bump: u8,
}

impl MessageLedger {
    pub const SIZE: usize = 32  // authority
        + 32  // input_verifier
        + 8   // total_messages
        + 1;  // bump

    pub fn initialize(&mut self, authority: Pubkey, input_verifier: Pubkey, bump: u8) {
        self.authority = authority;
        self.input_verifier = input_verifier;
        self.total_messages = 0;
        self.bump = bump;
    }

    /// Reserve the next message id
    pub fn next_id(&mut self) -> u64 {
        let id = self.total_messages;
        self.total_messages += 1;
        id
    }
}

/// One stored message, never modified after creation
#[account]
#[derive(Debug)]
pub struct MessageAccount {
    pub id: u64,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    /// Unix seconds from the Clock sysvar
    pub timestamp: i64,
    /// Envelope ciphertext
    pub body: String,
    /// Gateway handle of the envelope key
    pub key_handle: [u8; 32],
    pub bump: u8,
}

impl MessageAccount {
    /// Account size for a body of `body_len` bytes, discriminator included
    pub const fn space(body_len: usize) -> usize {
        DISCRIMINATOR_SIZE
            + 8   // id
            + 32  // sender
            + 32  // recipient
            + 8   // timestamp
            + 4 + body_len  // body
            + 32  // key_handle
            + 1   // bump
    }

    pub const MAX_SPACE: usize = Self::space(MAX_BODY_LEN);

    pub fn view(&self) -> MessageView {
        MessageView {
            id: self.id,
            sender: self.sender,
            recipient: self.recipient,
            timestamp: self.timestamp,
            body: self.body.clone(),
            key_handle: self.key_handle,
        }
    }
}

/// Per-recipient message counter
#[account]
#[derive(Debug)]
pub struct Inbox {
    pub recipient: Pubkey,
    pub count: u64,
    pub bump: u8,
}

impl Inbox {
    pub const SIZE: usize = 32 + 8 + 1;
}

/// Position `index` of a recipient's inbox
#[account]
#[derive(Debug)]
pub struct InboxEntry {
    pub message_id: u64,
    pub bump: u8,
}

impl InboxEntry {
    pub const SIZE: usize = 8 + 1;
}

/// Message as returned by the read instructions
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageView {
    pub id: u64,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub timestamp: i64,
    pub body: String,
    pub key_handle: [u8; 32],
}

pub fn derive_ledger_pda(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LEDGER_SEED], program_id)
}

pub fn derive_message_pda(program_id: &Pubkey, id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MESSAGE_SEED, &id.to_le_bytes()], program_id)
}

pub fn derive_inbox_pda(program_id: &Pubkey, recipient: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[INBOX_SEED, recipient.as_ref()], program_id)
}

pub fn derive_inbox_entry_pda(program_id: &Pubkey, recipient: &Pubkey, index: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[INBOX_ENTRY_SEED, recipient.as_ref(), &index.to_le_bytes()],
        program_id,
    )
}
