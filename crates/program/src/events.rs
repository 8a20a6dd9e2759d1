//! Program events

use anchor_lang::prelude::*;

/// Emitted once per stored message
#[event]
pub struct MessageSent {
    pub id: u64,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub timestamp: i64,
    pub body: String,
}

/// Emitted when the ledger is created
#[event]
pub struct LedgerInitialized {
    pub authority: Pubkey,
    pub input_verifier: Pubkey,
}
