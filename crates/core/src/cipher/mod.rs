//! Envelope codec: message bodies and their numeric keys

pub mod envelope;
pub mod keys;
pub mod sealed;

pub use envelope::{decode, decode_bytes, encode, BodyScheme};
pub use keys::{format_key, generate_key, KEY_DIGITS, MAX_KEY};
pub use sealed::{is_sealed, open, seal, SEALED_PREFIX};
