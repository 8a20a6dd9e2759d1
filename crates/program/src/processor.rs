//! Instruction processors
//!
//! Contains the business logic for each instruction.

use anchor_lang::prelude::*;

use crate::events::{LedgerInitialized, MessageSent};
use crate::instructions::{PulseProgramError, SendMessageData};
use crate::state::{
    Inbox, InboxEntry, MessageAccount, MessageView, INBOX_ENTRY_SEED, MESSAGE_SEED,
};
use crate::verification;
use crate::{GetInboxCount, GetInboxMessage, GetMessage, Initialize, SendMessage, TotalMessages};

/// Process Initialize instruction
pub fn process_initialize(ctx: Context<Initialize>, input_verifier: Pubkey) -> Result<()> {
    let ledger = &mut ctx.accounts.ledger;
    let authority = ctx.accounts.authority.key();

    ledger.initialize(authority, input_verifier, ctx.bumps.ledger);

    emit!(LedgerInitialized {
        authority,
        input_verifier,
    });
    msg!("Message ledger initialized");
    msg!("Input verifier: {}", input_verifier);
    Ok(())
}

/// Process SendMessage instruction
pub fn process_send_message(ctx: Context<SendMessage>, data: SendMessageData) -> Result<u64> {
    let proof = data.validate()?;

    let ledger_key = ctx.accounts.ledger.key();
    let sender = ctx.accounts.sender.key();
    verification::verify_input_proof(
        &ctx.accounts.instructions_sysvar,
        &ctx.accounts.ledger.input_verifier,
        &ledger_key,
        &sender,
        &proof,
    )?;

    let clock = Clock::get()?;
    let id = ctx.accounts.ledger.next_id();

    let message = &mut ctx.accounts.message;
    message.id = id;
    message.sender = sender;
    message.recipient = data.recipient;
    message.timestamp = clock.unix_timestamp;
    message.body = data.body;
    message.key_handle = data.key_handle;
    message.bump = ctx.bumps.message;

    let inbox = &mut ctx.accounts.inbox;
    if inbox.count == 0 {
        inbox.recipient = data.recipient;
        inbox.bump = ctx.bumps.inbox;
    }
    let index = inbox.count;
    inbox.count += 1;

    let entry = &mut ctx.accounts.inbox_entry;
    entry.message_id = id;
    entry.bump = ctx.bumps.inbox_entry;

    emit!(MessageSent {
        id,
        sender,
        recipient: message.recipient,
        timestamp: message.timestamp,
        body: message.body.clone(),
    });
    msg!("Message {} stored at inbox index {}", id, index);
    Ok(id)
}

/// Process GetInboxCount instruction
///
/// The inbox address is pinned by its seeds, so a missing inbox always
/// means zero messages rather than an omitted account.
pub fn process_get_inbox_count(ctx: Context<GetInboxCount>, _recipient: Pubkey) -> Result<u64> {
    read_inbox_count(&ctx.accounts.inbox)
}

/// Process GetInboxMessage instruction
pub fn process_get_inbox_message(
    ctx: Context<GetInboxMessage>,
    recipient: Pubkey,
    index: u64,
) -> Result<MessageView> {
    let count = read_inbox_count(&ctx.accounts.inbox)?;
    require!(index < count, PulseProgramError::OutOfRange);

    let entry: &Account<InboxEntry> = ctx
        .accounts
        .inbox_entry
        .as_ref()
        .ok_or(PulseProgramError::AccountMismatch)?;
    expect_pda(
        entry.key(),
        &[INBOX_ENTRY_SEED, recipient.as_ref(), &index.to_le_bytes(), &[entry.bump]],
    )?;

    let message = load_message(ctx.accounts.message.as_ref(), entry.message_id)?;
    Ok(message.view())
}

/// Process GetMessage instruction
pub fn process_get_message(ctx: Context<GetMessage>, id: u64) -> Result<MessageView> {
    require!(
        id < ctx.accounts.ledger.total_messages,
        PulseProgramError::NotFound
    );
    let message = load_message(ctx.accounts.message.as_ref(), id)?;
    Ok(message.view())
}

/// Process TotalMessages instruction
pub fn process_total_messages(ctx: Context<TotalMessages>) -> Result<u64> {
    Ok(ctx.accounts.ledger.total_messages)
}

/// Count stored in an inbox PDA; zero while the account is still empty
fn read_inbox_count(inbox: &AccountInfo) -> Result<u64> {
    if inbox.data_is_empty() {
        return Ok(0);
    }
    require_keys_eq!(*inbox.owner, crate::ID, PulseProgramError::AccountMismatch);
    let data = inbox.try_borrow_data()?;
    Ok(Inbox::try_deserialize(&mut &data[..])?.count)
}

fn load_message<'a, 'info>(
    account: Option<&'a Account<'info, MessageAccount>>,
    id: u64,
) -> Result<&'a Account<'info, MessageAccount>> {
    let message = account.ok_or(PulseProgramError::AccountMismatch)?;
    expect_pda(
        message.key(),
        &[MESSAGE_SEED, &id.to_le_bytes(), &[message.bump]],
    )?;
    require!(message.id == id, PulseProgramError::AccountMismatch);
    Ok(message)
}

/// Require `actual` to be the PDA for `seeds` (bump included)
fn expect_pda(actual: Pubkey, seeds: &[&[u8]]) -> Result<()> {
    let expected = Pubkey::create_program_address(seeds, &crate::ID)
        .map_err(|_| PulseProgramError::AccountMismatch)?;
    require_keys_eq!(actual, expected, PulseProgramError::AccountMismatch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{derive_inbox_entry_pda, derive_inbox_pda, derive_message_pda, INBOX_SEED};

    #[test]
    fn test_expect_pda_matches_derivation() {
        let recipient = Pubkey::new_unique();
        let (inbox, bump) = derive_inbox_pda(&crate::ID, &recipient);
        assert!(expect_pda(inbox, &[INBOX_SEED, recipient.as_ref(), &[bump]]).is_ok());

        let (entry, bump) = derive_inbox_entry_pda(&crate::ID, &recipient, 3);
        assert!(expect_pda(
            entry,
            &[INBOX_ENTRY_SEED, recipient.as_ref(), &3u64.to_le_bytes(), &[bump]]
        )
        .is_ok());
    }

    #[test]
    fn test_read_inbox_count() {
        let key = Pubkey::new_unique();
        let system = anchor_lang::system_program::ID;
        let mut lamports = 0u64;
        let mut empty: Vec<u8> = Vec::new();
        let info = AccountInfo::new(&key, false, false, &mut lamports, &mut empty, &system, false, 0);
        assert_eq!(read_inbox_count(&info).unwrap(), 0);

        let inbox = Inbox {
            recipient: Pubkey::new_unique(),
            count: 3,
            bump: 254,
        };
        let mut data = Vec::new();
        inbox.try_serialize(&mut data).unwrap();

        let mut lamports = 1u64;
        let info = AccountInfo::new(&key, false, false, &mut lamports, &mut data, &crate::ID, false, 0);
        assert_eq!(read_inbox_count(&info).unwrap(), 3);

        // Same bytes under a foreign owner are not trusted
        let mut lamports = 1u64;
        let mut forged = data.clone();
        let info = AccountInfo::new(&key, false, false, &mut lamports, &mut forged, &system, false, 0);
        assert!(read_inbox_count(&info).is_err());
    }

    #[test]
    fn test_expect_pda_rejects_other_accounts() {
        let (message_0, bump) = derive_message_pda(&crate::ID, 0);
        let (message_1, _) = derive_message_pda(&crate::ID, 1);
        assert!(expect_pda(message_0, &[MESSAGE_SEED, &0u64.to_le_bytes(), &[bump]]).is_ok());
        assert!(expect_pda(message_1, &[MESSAGE_SEED, &0u64.to_le_bytes(), &[bump]]).is_err());
        assert!(expect_pda(Pubkey::new_unique(), &[MESSAGE_SEED, &0u64.to_le_bytes(), &[bump]]).is_err());
    }
}
