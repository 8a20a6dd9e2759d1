//! PrivatePulse - Solana Message Ledger
//!
//! On-chain program storing encrypted messages in per-recipient inboxes.
//! Each message carries a gateway key handle whose input proof is checked
//! through the ed25519 program before the message is accepted.

use anchor_lang::prelude::*;

// Replace with the deployed program address
declare_id!("Pu1se11111111111111111111111111111111111111");

pub mod events;
pub mod instructions;
pub mod processor;
pub mod state;
pub mod verification;

use instructions::{SendMessageData, MAX_BODY_LEN};
use state::{
    Inbox, InboxEntry, MessageAccount, MessageLedger, MessageView, INBOX_ENTRY_SEED, INBOX_SEED,
    LEDGER_SEED, MESSAGE_SEED,
};

#[program]
pub mod pulse_program {
    use super::*;

    /// Create the ledger and register the gateway's input-verifier key
    pub fn initialize(ctx: Context<Initialize>, input_verifier: Pubkey) -> Result<()> {
        processor::process_initialize(ctx, input_verifier)
    }

    /// Store a message for `recipient`; returns the new message id
    ///
    /// Must be preceded by an ed25519 program instruction verifying the
    /// input proof signature.
    pub fn send_message(
        ctx: Context<SendMessage>,
        recipient: Pubkey,
        body: String,
        key_handle: [u8; 32],
        input_proof: Vec<u8>,
    ) -> Result<u64> {
        processor::process_send_message(
            ctx,
            SendMessageData {
                recipient,
                body,
                key_handle,
                input_proof,
            },
        )
    }

    /// Number of messages received by `recipient`
    pub fn get_inbox_count(ctx: Context<GetInboxCount>, recipient: Pubkey) -> Result<u64> {
        processor::process_get_inbox_count(ctx, recipient)
    }

    /// The `index`-th message received by `recipient`, oldest first
    pub fn get_inbox_message(
        ctx: Context<GetInboxMessage>,
        recipient: Pubkey,
        index: u64,
    ) -> Result<MessageView> {
        processor::process_get_inbox_message(ctx, recipient, index)
    }

    /// Message by global id
    pub fn get_message(ctx: Context<GetMessage>, id: u64) -> Result<MessageView> {
        processor::process_get_message(ctx, id)
    }

    /// Number of messages stored so far
    pub fn total_messages(ctx: Context<TotalMessages>) -> Result<u64> {
        processor::process_total_messages(ctx)
    }
}

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(
        init,
        payer = authority,
        space = 8 + MessageLedger::SIZE,
        seeds = [LEDGER_SEED],
        bump
    )]
    pub ledger: Account<'info, MessageLedger>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(recipient: Pubkey, body: String)]
pub struct SendMessage<'info> {
    #[account(
        mut,
        seeds = [LEDGER_SEED],
        bump = ledger.bump
    )]
    pub ledger: Account<'info, MessageLedger>,

    /// Message PDA for the next global id
    #[account(
        init,
        payer = sender,
        space = MessageAccount::space(body.len().min(MAX_BODY_LEN)),
        seeds = [MESSAGE_SEED, &ledger.total_messages.to_le_bytes()],
        bump
    )]
    pub message: Account<'info, MessageAccount>,

    /// Recipient's inbox counter, created on first message
    #[account(
        init_if_needed,
        payer = sender,
        space = 8 + Inbox::SIZE,
        seeds = [INBOX_SEED, recipient.as_ref()],
        bump
    )]
    pub inbox: Account<'info, Inbox>,

    /// Next slot of the recipient's inbox
    #[account(
        init,
        payer = sender,
        space = 8 + InboxEntry::SIZE,
        seeds = [INBOX_ENTRY_SEED, recipient.as_ref(), &inbox.count.to_le_bytes()],
        bump
    )]
    pub inbox_entry: Account<'info, InboxEntry>,

    #[account(mut)]
    pub sender: Signer<'info>,

    #[account(address = ::anchor_lang::solana_program::sysvar::instructions::ID)]
    /// CHECK: instructions sysvar, read for ed25519 introspection
    pub instructions_sysvar: AccountInfo<'info>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(recipient: Pubkey)]
pub struct GetInboxCount<'info> {
    /// CHECK: recipient's inbox PDA, uninitialized until the first message
    #[account(seeds = [INBOX_SEED, recipient.as_ref()], bump)]
    pub inbox: UncheckedAccount<'info>,
}

#[derive(Accounts)]
#[instruction(recipient: Pubkey)]
pub struct GetInboxMessage<'info> {
    /// CHECK: recipient's inbox PDA, uninitialized until the first message
    #[account(seeds = [INBOX_SEED, recipient.as_ref()], bump)]
    pub inbox: UncheckedAccount<'info>,
    pub inbox_entry: Option<Account<'info, InboxEntry>>,
    pub message: Option<Account<'info, MessageAccount>>,
}

#[derive(Accounts)]
pub struct GetMessage<'info> {
    #[account(
        seeds = [LEDGER_SEED],
        bump = ledger.bump
    )]
    pub ledger: Account<'info, MessageLedger>,

    pub message: Option<Account<'info, MessageAccount>>,
}

#[derive(Accounts)]
pub struct TotalMessages<'info> {
    #[account(
        seeds = [LEDGER_SEED],
        bump = ledger.bump
    )]
    pub ledger: Account<'info, MessageLedger>,
}
