//! Envelope keys
//!
//! Every message is encrypted under a fresh six-digit numeric key. The key is
//! what travels confidentially through the gateway; its decimal rendering is
//! the codec input.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use tracing::warn;

/// Number of decimal digits in a rendered key
pub const KEY_DIGITS: usize = 6;

/// Largest valid key
pub const MAX_KEY: u32 = 999_999;

const KEY_SPACE: u32 = MAX_KEY + 1;

/// Draws at or above this bound are rejected so that `v % KEY_SPACE` stays uniform
const REJECTION_BOUND: u32 = u32::MAX - (u32::MAX % KEY_SPACE);

/// Generate a fresh envelope key, uniform over `0..=999_999`
///
/// Uses the operating system CSPRNG. If that source is unavailable the key
/// is drawn from a time-seeded generator instead; such keys are predictable
/// and the fallback is logged.
pub fn generate_key() -> u32 {
    match sample_key(&mut OsRng) {
        Ok(key) => key,
        Err(err) => {
            warn!(error = %err, "OS randomness unavailable, falling back to time-seeded key");
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default();
            sample_key(&mut StdRng::seed_from_u64(seed)).unwrap_or((seed % KEY_SPACE as u64) as u32)
        }
    }
}

/// Render a key as a zero-padded six-digit string
///
/// Negative or out-of-range input is clamped to zero.
pub fn format_key(key: i64) -> String {
    let key = if (0..=i64::from(MAX_KEY)).contains(&key) { key } else { 0 };
    format!("{:0width$}", key, width = KEY_DIGITS)
}

fn sample_key<R: RngCore + ?Sized>(rng: &mut R) -> Result<u32, rand::Error> {
    loop {
        let mut buf = [0u8; 4];
        rng.try_fill_bytes(&mut buf)?;
        let value = u32::from_le_bytes(buf);
        if value < REJECTION_BOUND {
            return Ok(value % KEY_SPACE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_key_pads() {
        assert_eq!(format_key(0), "000000");
        assert_eq!(format_key(42), "000042");
        assert_eq!(format_key(123456), "123456");
        assert_eq!(format_key(999_999), "999999");
    }

    #[test]
    fn test_format_key_clamps() {
        assert_eq!(format_key(-1), "000000");
        assert_eq!(format_key(i64::MIN), "000000");
        assert_eq!(format_key(1_000_000), "000000");
    }

    #[test]
    fn test_generated_keys_in_range() {
        for _ in 0..1_000 {
            assert!(generate_key() <= MAX_KEY);
        }
    }

    #[test]
    fn test_sample_key_is_deterministic_for_seeded_rng() {
        let a = sample_key(&mut StdRng::seed_from_u64(7)).unwrap();
        let b = sample_key(&mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert!(a <= MAX_KEY);
    }

    #[test]
    fn test_rejection_bound_is_multiple_of_key_space() {
        assert_eq!(REJECTION_BOUND % KEY_SPACE, 0);
    }
}
