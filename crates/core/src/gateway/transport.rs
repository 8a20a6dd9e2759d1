//! Re-encryption of decrypted values to a requester's transport key
//!
//! The requester generates a throwaway x25519 keypair per decryption and puts
//! its public half in the signed authorization. The gateway seals each clear
//! value to that key (ephemeral-static ECDH, HKDF-SHA256, ChaCha20-Poly1305),
//! so only the holder of the private half can read the response.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::GatewayError;

const TRANSPORT_INFO: &[u8] = b"PrivatePulse/transport/v1";

/// A clear value sealed to a transport public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    pub ephemeral_public: [u8; 32],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

/// Per-request x25519 keypair
pub struct TransportKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl TransportKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Open a value sealed to this keypair
    pub fn open(&self, sealed: &SealedValue) -> Result<u64, GatewayError> {
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(sealed.ephemeral_public));
        let cipher = transport_cipher(shared.as_bytes(), &sealed.ephemeral_public, self.public.as_bytes())?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_ref())
            .map_err(|_| GatewayError::Transport("response does not open with this key".into()))?;

        let bytes: [u8; 8] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| GatewayError::Transport(format!("expected 8 value bytes, got {}", plaintext.len())))?;
        Ok(u64::from_le_bytes(bytes))
    }
}

impl std::fmt::Debug for TransportKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKeypair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Seal `value` so only the owner of `recipient_public` can read it
pub fn seal_value(recipient_public: &[u8; 32], value: u64) -> Result<SealedValue, GatewayError> {
    let recipient = PublicKey::from(*recipient_public);
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&recipient);

    let cipher = transport_cipher(shared.as_bytes(), &ephemeral_public, recipient_public)?;
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), value.to_le_bytes().as_ref())
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

    Ok(SealedValue {
        ephemeral_public,
        nonce,
        ciphertext,
    })
}

fn transport_cipher(
    shared: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<ChaCha20Poly1305, GatewayError> {
    let mut info = Vec::with_capacity(TRANSPORT_INFO.len() + 64);
    info.extend_from_slice(TRANSPORT_INFO);
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut okm = [0u8; 32];
    hk.expand(&info, &mut okm)
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
    ChaCha20Poly1305::new_from_slice(&okm).map_err(|e| GatewayError::Transport(e.to_string()))
}
