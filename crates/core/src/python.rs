//! Python bindings for the envelope codec
//!
//! Exposed as the `_rust_core` extension module when built with the
//! `python` feature.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::cipher;
use crate::error::validation;

/// Encode a message body under a six-digit key
///
/// # Arguments
/// * `plaintext` - Message body
/// * `key` - Envelope key (0..=999999)
///
/// # Returns
/// * Base64 transport ciphertext
#[pyfunction]
fn encode_message(plaintext: &str, key: u64) -> PyResult<String> {
    let key = validation::validate_key(key).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(cipher::encode(plaintext, key))
}

/// Decode a message body produced by `encode_message`
///
/// A wrong key does not raise; it returns unreadable text.
#[pyfunction]
fn decode_message(ciphertext: &str, key: u64) -> PyResult<String> {
    let key = validation::validate_key(key).map_err(|e| PyValueError::new_err(e.to_string()))?;
    cipher::decode(ciphertext, key).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Seal a message body with ChaCha20-Poly1305
#[pyfunction]
fn seal_message(plaintext: &str, key: u64) -> PyResult<String> {
    let key = validation::validate_key(key).map_err(|e| PyValueError::new_err(e.to_string()))?;
    cipher::seal(plaintext, key).map_err(|e| PyRuntimeError::new_err(format!("Sealing failed: {}", e)))
}

/// Open a body produced by `seal_message`
#[pyfunction]
fn open_message(ciphertext: &str, key: u64) -> PyResult<String> {
    let key = validation::validate_key(key).map_err(|e| PyValueError::new_err(e.to_string()))?;
    cipher::open(ciphertext, key).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Fresh random envelope key
#[pyfunction]
fn generate_key() -> u32 {
    cipher::generate_key()
}

/// Six-digit rendering of a key; out-of-range input renders as "000000"
#[pyfunction]
fn format_key(key: i64) -> String {
    cipher::format_key(key)
}

#[pymodule]
fn _rust_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(encode_message, m)?)?;
    m.add_function(wrap_pyfunction!(decode_message, m)?)?;
    m.add_function(wrap_pyfunction!(seal_message, m)?)?;
    m.add_function(wrap_pyfunction!(open_message, m)?)?;
    m.add_function(wrap_pyfunction!(generate_key, m)?)?;
    m.add_function(wrap_pyfunction!(format_key, m)?)?;
    Ok(())
}
