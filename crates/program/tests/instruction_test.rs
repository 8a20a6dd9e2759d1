//! Instruction construction tests for the message ledger program
//!
//! Builds instructions the way a client does (Anchor's generated
//! `instruction` and `accounts` modules) and checks layouts, PDAs and the
//! ed25519 companion instruction.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use anchor_lang::solana_program::sysvar;
use anchor_lang::{Discriminator, InstructionData, ToAccountMetas};
use ed25519_dalek::{Signer, SigningKey};

use pulse_program::instructions::MAX_BODY_LEN;
use pulse_program::state::{
    derive_inbox_entry_pda, derive_inbox_pda, derive_ledger_pda, derive_message_pda, MessageView,
};
use pulse_program::verification::{
    build_input_digest, check_ed25519_instruction, new_ed25519_instruction, InputProof,
};

fn program_id() -> Pubkey {
    pulse_program::ID
}

struct SendFixture {
    gateway: SigningKey,
    sender: Pubkey,
    recipient: Pubkey,
    handle: [u8; 32],
}

impl SendFixture {
    fn new() -> Self {
        Self {
            gateway: SigningKey::from_bytes(&[42u8; 32]),
            sender: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            handle: [7u8; 32],
        }
    }

    fn input_proof(&self, ledger: &Pubkey) -> Vec<u8> {
        let digest = build_input_digest(ledger, &self.sender, &[self.handle]);
        let signature = self.gateway.sign(&digest).to_bytes();
        let mut proof = vec![1u8];
        proof.extend_from_slice(&self.handle);
        proof.extend_from_slice(&signature);
        proof
    }

    /// `[ed25519 verify, send_message]` for message `id` at inbox `index`
    fn instructions(&self, body: &str, id: u64, index: u64) -> Vec<Instruction> {
        let (ledger, _) = derive_ledger_pda(&program_id());
        let input_proof = self.input_proof(&ledger);
        let proof = InputProof::from_bytes(&input_proof).unwrap();

        let verify = new_ed25519_instruction(
            &self.gateway.verifying_key().to_bytes(),
            &proof.signature,
            &proof.digest(&ledger, &self.sender),
        );

        let accounts = pulse_program::accounts::SendMessage {
            ledger,
            message: derive_message_pda(&program_id(), id).0,
            inbox: derive_inbox_pda(&program_id(), &self.recipient).0,
            inbox_entry: derive_inbox_entry_pda(&program_id(), &self.recipient, index).0,
            sender: self.sender,
            instructions_sysvar: sysvar::instructions::ID,
            system_program: anchor_lang::system_program::ID,
        };
        let data = pulse_program::instruction::SendMessage {
            recipient: self.recipient,
            body: body.to_string(),
            key_handle: self.handle,
            input_proof,
        };
        let send = Instruction {
            program_id: program_id(),
            accounts: accounts.to_account_metas(None),
            data: data.data(),
        };

        vec![verify, send]
    }
}

#[test]
fn test_initialize_instruction() {
    let authority = Pubkey::new_unique();
    let verifier = Pubkey::new_unique();
    let (ledger, _) = derive_ledger_pda(&program_id());

    let metas = pulse_program::accounts::Initialize {
        ledger,
        authority,
        system_program: anchor_lang::system_program::ID,
    }
    .to_account_metas(None);
    assert_eq!(metas.len(), 3);
    assert!(metas[0].is_writable && !metas[0].is_signer);
    assert!(metas[1].is_writable && metas[1].is_signer);

    let data = pulse_program::instruction::Initialize {
        input_verifier: verifier,
    }
    .data();
    let disc = pulse_program::instruction::Initialize::DISCRIMINATOR;
    assert_eq!(&data[..disc.len()], disc);
    assert_eq!(&data[disc.len()..], verifier.as_ref());
}

#[test]
fn test_send_message_layout() {
    let fixture = SendFixture::new();
    let ixs = fixture.instructions("ciphertext::hello-recipient", 0, 0);
    assert_eq!(ixs.len(), 2);

    let send = &ixs[1];
    assert_eq!(send.program_id, program_id());
    let metas = &send.accounts;
    assert_eq!(metas.len(), 7);
    // ledger, message, inbox, inbox_entry are written
    for meta in &metas[..4] {
        assert!(meta.is_writable, "{} should be writable", meta.pubkey);
        assert!(!meta.is_signer);
    }
    assert_eq!(metas[4].pubkey, fixture.sender);
    assert!(metas[4].is_signer && metas[4].is_writable);
    assert_eq!(metas[5].pubkey, sysvar::instructions::ID);
    assert!(!metas[5].is_writable);

    // Arguments decode back after the discriminator
    let disc = pulse_program::instruction::SendMessage::DISCRIMINATOR;
    assert_eq!(&send.data[..disc.len()], disc);
    let mut rest = &send.data[disc.len()..];
    let decoded = pulse_program::instruction::SendMessage::deserialize(&mut rest).unwrap();
    assert_eq!(decoded.recipient, fixture.recipient);
    assert_eq!(decoded.body, "ciphertext::hello-recipient");
    assert_eq!(decoded.key_handle, fixture.handle);
    assert_eq!(decoded.input_proof.len(), 1 + 32 + 64);
}

#[test]
fn test_companion_instruction_verifies() {
    let fixture = SendFixture::new();
    let ixs = fixture.instructions("body", 0, 0);
    let (ledger, _) = derive_ledger_pda(&program_id());

    let data = pulse_program::instruction::SendMessage::deserialize(
        &mut &ixs[1].data[pulse_program::instruction::SendMessage::DISCRIMINATOR.len()..],
    )
    .unwrap();
    let proof = InputProof::from_bytes(&data.input_proof).unwrap();
    assert!(proof.attests(&fixture.handle));

    let verifier = fixture.gateway.verifying_key().to_bytes();
    let digest = proof.digest(&ledger, &fixture.sender);
    assert!(check_ed25519_instruction(&ixs[0], &verifier, &proof.signature, &digest).is_ok());

    // Same proof replayed by another sender does not match
    let replay_digest = proof.digest(&ledger, &Pubkey::new_unique());
    assert!(check_ed25519_instruction(&ixs[0], &verifier, &proof.signature, &replay_digest).is_err());
}

#[test]
fn test_inbox_pdas_follow_arrival_order() {
    let fixture = SendFixture::new();
    let first = fixture.instructions("a", 0, 0);
    let second = fixture.instructions("b", 5, 1);

    // Same inbox counter, different entry and message accounts
    assert_eq!(first[1].accounts[2].pubkey, second[1].accounts[2].pubkey);
    assert_ne!(first[1].accounts[3].pubkey, second[1].accounts[3].pubkey);
    assert_ne!(first[1].accounts[1].pubkey, second[1].accounts[1].pubkey);
}

#[test]
fn test_read_instruction_accounts() {
    let recipient = Pubkey::new_unique();

    // The inbox is always the seeded PDA, whether or not it exists yet
    let (inbox, _) = derive_inbox_pda(&program_id(), &recipient);
    let metas = pulse_program::accounts::GetInboxCount { inbox }.to_account_metas(None);
    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].pubkey, inbox);

    let metas = pulse_program::accounts::GetInboxMessage {
        inbox,
        inbox_entry: Some(derive_inbox_entry_pda(&program_id(), &recipient, 0).0),
        message: Some(derive_message_pda(&program_id(), 0).0),
    }
    .to_account_metas(None);
    assert_eq!(metas.len(), 3);
    assert!(metas.iter().all(|m| !m.is_writable && !m.is_signer));

    let data = pulse_program::instruction::GetInboxMessage {
        recipient,
        index: 4,
    }
    .data();
    let disc = pulse_program::instruction::GetInboxMessage::DISCRIMINATOR;
    assert_eq!(&data[disc.len()..disc.len() + 32], recipient.as_ref());
    assert_eq!(&data[disc.len() + 32..], &4u64.to_le_bytes());
}

#[test]
fn test_message_view_return_data() {
    let view = MessageView {
        id: 0,
        sender: Pubkey::new_unique(),
        recipient: Pubkey::new_unique(),
        timestamp: 1_700_000_000,
        body: "x".repeat(MAX_BODY_LEN),
        key_handle: [3u8; 32],
    };
    let mut bytes = Vec::new();
    AnchorSerialize::serialize(&view, &mut bytes).unwrap();
    // Solana return data is capped at 1 KiB
    assert!(bytes.len() <= 1024, "view is {} bytes", bytes.len());

    let decoded = MessageView::deserialize(&mut bytes.as_slice()).unwrap();
    assert_eq!(decoded, view);
}
