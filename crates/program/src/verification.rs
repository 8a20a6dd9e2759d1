//! Input Proof Verification
//!
//! A send carries an input proof from the key gateway: a list of attested
//! handles plus the gateway's ed25519 signature over
//! `sha256(INPUT_PROOF_DOMAIN || ledger || sender || handles)`.
//!
//! Signature checking is delegated to the native ed25519 program. The client
//! places an ed25519 verify instruction immediately before `send_message`;
//! this module reads it back through the instructions sysvar and confirms it
//! checked exactly the expected key, signature and digest.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::Instruction;
use anchor_lang::solana_program::sysvar::instructions::{
    load_current_index_checked, load_instruction_at_checked,
};
use sha2::{Digest, Sha256};

use crate::instructions::PulseProgramError;

/// Native ed25519 signature verification program
pub const ED25519_PROGRAM_ID: Pubkey = pubkey!("Ed25519SigVerify111111111111111111111111111");

/// Domain separator for input-proof digests
pub const INPUT_PROOF_DOMAIN: &[u8] = b"PrivatePulse/input-proof/v1";

pub const HANDLE_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;
pub const PUBKEY_SIZE: usize = 32;

/// Offsets header of the ed25519 program: count (1) + padding (1)
const ED25519_OFFSETS_START: usize = 2;
/// One `Ed25519SignatureOffsets` entry: seven little-endian u16
const ED25519_OFFSETS_SIZE: usize = 14;
/// First byte after a single offsets entry
const ED25519_DATA_START: usize = ED25519_OFFSETS_START + ED25519_OFFSETS_SIZE;
/// Instruction index meaning "this instruction"
const CURRENT_INSTRUCTION: u16 = u16::MAX;

/// Parsed input proof
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputProof {
    pub handles: Vec<[u8; HANDLE_SIZE]>,
    pub signature: [u8; SIGNATURE_SIZE],
}

impl InputProof {
    /// Parse from proof bytes
    /// Format: [n (1) | handles (n * 32) | signature (64)]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&count, rest) = bytes.split_first()?;
        let count = count as usize;
        if count == 0 || rest.len() != count * HANDLE_SIZE + SIGNATURE_SIZE {
            return None;
        }

        let (handle_bytes, sig_bytes) = rest.split_at(count * HANDLE_SIZE);
        let handles = handle_bytes
            .chunks_exact(HANDLE_SIZE)
            .map(|chunk| {
                let mut handle = [0u8; HANDLE_SIZE];
                handle.copy_from_slice(chunk);
                handle
            })
            .collect();
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(sig_bytes);

        Some(Self { handles, signature })
    }

    pub fn attests(&self, handle: &[u8; HANDLE_SIZE]) -> bool {
        self.handles.iter().any(|h| h == handle)
    }

    /// Digest the gateway signs
    pub fn digest(&self, ledger: &Pubkey, sender: &Pubkey) -> [u8; 32] {
        build_input_digest(ledger, sender, &self.handles)
    }
}

/// Build the digest signed for an input proof
///
/// Digest = sha256(domain || ledger || sender || handles)
pub fn build_input_digest(ledger: &Pubkey, sender: &Pubkey, handles: &[[u8; HANDLE_SIZE]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(INPUT_PROOF_DOMAIN);
    hasher.update(ledger.as_ref());
    hasher.update(sender.as_ref());
    for handle in handles {
        hasher.update(handle);
    }
    hasher.finalize().into()
}

/// Build the ed25519 program instruction that must precede `send_message`
pub fn new_ed25519_instruction(
    pubkey: &[u8; PUBKEY_SIZE],
    signature: &[u8; SIGNATURE_SIZE],
    message: &[u8],
) -> Instruction {
    let public_key_offset = ED25519_DATA_START;
    let signature_offset = public_key_offset + PUBKEY_SIZE;
    let message_offset = signature_offset + SIGNATURE_SIZE;

    let mut data = Vec::with_capacity(message_offset + message.len());
    data.push(1); // num_signatures
    data.push(0); // padding
    for value in [
        signature_offset as u16,
        CURRENT_INSTRUCTION,
        public_key_offset as u16,
        CURRENT_INSTRUCTION,
        message_offset as u16,
        message.len() as u16,
        CURRENT_INSTRUCTION,
    ] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data.extend_from_slice(pubkey);
    data.extend_from_slice(signature);
    data.extend_from_slice(message);

    Instruction {
        program_id: ED25519_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

/// Check that `ix` is an ed25519 verification of exactly one
/// `(pubkey, signature, message)` triple, all carried inline
pub fn check_ed25519_instruction(
    ix: &Instruction,
    pubkey: &[u8; PUBKEY_SIZE],
    signature: &[u8; SIGNATURE_SIZE],
    message: &[u8],
) -> Result<()> {
    require_keys_eq!(ix.program_id, ED25519_PROGRAM_ID, PulseProgramError::InvalidProof);

    let data = &ix.data;
    require!(
        data.len() >= ED25519_DATA_START && data[0] == 1,
        PulseProgramError::InvalidProof
    );

    let field = |i: usize| -> u16 {
        let at = ED25519_OFFSETS_START + i * 2;
        u16::from_le_bytes([data[at], data[at + 1]])
    };
    let signature_offset = field(0) as usize;
    let public_key_offset = field(2) as usize;
    let message_offset = field(4) as usize;
    let message_size = field(5) as usize;

    // Data must come from the ed25519 instruction itself
    require!(
        field(1) == CURRENT_INSTRUCTION
            && field(3) == CURRENT_INSTRUCTION
            && field(6) == CURRENT_INSTRUCTION,
        PulseProgramError::InvalidProof
    );

    let slice = |offset: usize, len: usize| data.get(offset..offset.checked_add(len)?);
    let found_pubkey = slice(public_key_offset, PUBKEY_SIZE).ok_or(PulseProgramError::InvalidProof)?;
    let found_signature = slice(signature_offset, SIGNATURE_SIZE).ok_or(PulseProgramError::InvalidProof)?;
    let found_message = slice(message_offset, message_size).ok_or(PulseProgramError::InvalidProof)?;

    require!(
        found_pubkey == pubkey.as_slice()
            && found_signature == signature.as_slice()
            && found_message == message,
        PulseProgramError::InvalidProof
    );
    Ok(())
}

/// Verify an input proof against the instruction preceding this one
pub fn verify_input_proof(
    instructions_sysvar: &AccountInfo,
    input_verifier: &Pubkey,
    ledger: &Pubkey,
    sender: &Pubkey,
    proof: &InputProof,
) -> Result<()> {
    let current = load_current_index_checked(instructions_sysvar)?;
    require!(current > 0, PulseProgramError::InvalidProof);
    let previous = load_instruction_at_checked(current as usize - 1, instructions_sysvar)?;

    let digest = proof.digest(ledger, sender);
    check_ed25519_instruction(&previous, &input_verifier.to_bytes(), &proof.signature, &digest)
}
