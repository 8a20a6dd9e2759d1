//! Program instructions
//!
//! Instruction payloads and the program's error codes.
//!
//! Input proof layout (shared with the off-chain gateway):
//! `[n: u8][n x 32-byte handle][64-byte ed25519 signature]`

use anchor_lang::prelude::*;

use crate::verification::{InputProof, HANDLE_SIZE, PUBKEY_SIZE, SIGNATURE_SIZE};

/// Largest serialized transaction the cluster accepts (`PACKET_DATA_SIZE`)
pub const MAX_TRANSACTION_SIZE: usize = 1232;

/// Data of the companion ed25519 instruction: offsets header, key,
/// signature and the 32-byte digest
pub const ED25519_INSTRUCTION_DATA_LEN: usize = 16 + PUBKEY_SIZE + SIGNATURE_SIZE + 32;

/// `send_message` data without the body bytes: discriminator, recipient,
/// body length prefix, key handle, proof length prefix and a one-handle proof
pub const SEND_MESSAGE_DATA_OVERHEAD: usize =
    8 + 32 + 4 + HANDLE_SIZE + 4 + (1 + HANDLE_SIZE + SIGNATURE_SIZE);

/// Accounts named by `send_message`
pub const SEND_MESSAGE_ACCOUNTS: usize = 7;

/// Size of a legacy `[ed25519 verify, send_message]` transaction paid for
/// and signed by the sender, excluding the body bytes
pub const SEND_TRANSACTION_OVERHEAD: usize =
    // signature count + one signature
    1 + 64
    // message header
    + 3
    // account keys: the send_message accounts plus both program ids
    + 1 + (SEND_MESSAGE_ACCOUNTS + 2) * 32
    + 32 // recent blockhash
    + 1 // instruction count
    // ed25519: program index, empty account list, two-byte data length
    + 1 + 1 + 2 + ED25519_INSTRUCTION_DATA_LEN
    // send_message: program index, account indexes, two-byte data length
    + 1 + 1 + SEND_MESSAGE_ACCOUNTS + 2 + SEND_MESSAGE_DATA_OVERHEAD;

/// Largest message body accepted, in bytes
///
/// Whatever is left of one transaction after the fixed overhead. A
/// full-size `MessageView` also fits the 1024-byte return data limit.
pub const MAX_BODY_LEN: usize = MAX_TRANSACTION_SIZE - SEND_TRANSACTION_OVERHEAD;

/// Instruction data for SendMessage
#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct SendMessageData {
    pub recipient: Pubkey,
    /// Envelope ciphertext
    pub body: String,
    /// Gateway handle of the envelope key
    pub key_handle: [u8; 32],
    pub input_proof: Vec<u8>,
}

/// Custom error codes for the message ledger
#[error_code]
pub enum PulseProgramError {
    #[msg("Input proof is malformed or was not verified by the ed25519 program")]
    InvalidProof,
    #[msg("Recipient must not be the default public key")]
    InvalidRecipient,
    #[msg("Message body exceeds the maximum length")]
    BodyTooLong,
    #[msg("Inbox index out of range")]
    OutOfRange,
    #[msg("Message not found")]
    NotFound,
    #[msg("Account does not match the expected PDA")]
    AccountMismatch,
}

impl SendMessageData {
    /// Checks that need no account state; returns the parsed proof
    pub fn validate(&self) -> Result<InputProof> {
        require!(
            self.recipient != Pubkey::default(),
            PulseProgramError::InvalidRecipient
        );
        require!(
            self.body.len() <= MAX_BODY_LEN,
            PulseProgramError::BodyTooLong
        );

        let proof = InputProof::from_bytes(&self.input_proof)
            .ok_or(PulseProgramError::InvalidProof)?;
        require!(
            proof.attests(&self.key_handle),
            PulseProgramError::InvalidProof
        );
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof_bytes(handles: &[[u8; 32]]) -> Vec<u8> {
        let mut out = vec![handles.len() as u8];
        for handle in handles {
            out.extend_from_slice(handle);
        }
        out.extend_from_slice(&[9u8; 64]);
        out
    }

    fn data(recipient: Pubkey, body: String, proof: Vec<u8>) -> SendMessageData {
        SendMessageData {
            recipient,
            body,
            key_handle: [1u8; 32],
            input_proof: proof,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let d = data(Pubkey::new_unique(), "abc".into(), proof_bytes(&[[1u8; 32]]));
        let proof = d.validate().unwrap();
        assert_eq!(proof.handles, vec![[1u8; 32]]);
    }

    #[test]
    fn test_validate_rejects_default_recipient() {
        let d = data(Pubkey::default(), "abc".into(), proof_bytes(&[[1u8; 32]]));
        assert_eq!(d.validate().unwrap_err(), PulseProgramError::InvalidRecipient.into());
    }

    #[test]
    fn test_validate_body_limit() {
        let ok = data(Pubkey::new_unique(), "x".repeat(MAX_BODY_LEN), proof_bytes(&[[1u8; 32]]));
        assert!(ok.validate().is_ok());

        let long = data(Pubkey::new_unique(), "x".repeat(MAX_BODY_LEN + 1), proof_bytes(&[[1u8; 32]]));
        assert_eq!(long.validate().unwrap_err(), PulseProgramError::BodyTooLong.into());
    }

    #[test]
    fn test_body_limit_fits_one_transaction() {
        assert_eq!(ED25519_INSTRUCTION_DATA_LEN, 144);
        assert_eq!(SEND_MESSAGE_DATA_OVERHEAD, 177);
        assert_eq!(SEND_TRANSACTION_OVERHEAD, 726);
        assert_eq!(MAX_BODY_LEN, 506);
    }

    #[test]
    fn test_validate_requires_attested_handle() {
        let d = data(Pubkey::new_unique(), "abc".into(), proof_bytes(&[[2u8; 32]]));
        assert_eq!(d.validate().unwrap_err(), PulseProgramError::InvalidProof.into());

        let d = data(Pubkey::new_unique(), "abc".into(), vec![1, 2, 3]);
        assert_eq!(d.validate().unwrap_err(), PulseProgramError::InvalidProof.into());
    }
}
