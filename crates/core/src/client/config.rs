//! Client configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::cipher::BodyScheme;
use crate::error::{PulseError, PulseResult};
use crate::gateway::authorization::MAX_DURATION_DAYS;

/// Default decrypt authorization window in days
pub const DEFAULT_DECRYPT_WINDOW_DAYS: u64 = 7;

/// Default limit on encoded body size, equal to the on-chain limit
pub const DEFAULT_MAX_BODY_LEN: usize = 506;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ledger the client talks to. Null means "use the backend's address".
    pub ledger_address: AccountId,
    pub decrypt_window_days: u64,
    pub body_scheme: BodyScheme,
    pub max_body_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ledger_address: AccountId::NULL,
            decrypt_window_days: DEFAULT_DECRYPT_WINDOW_DAYS,
            body_scheme: BodyScheme::default(),
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> PulseResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> PulseResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PulseError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> PulseResult<()> {
        if !(1..=MAX_DURATION_DAYS).contains(&self.decrypt_window_days) {
            return Err(PulseError::Configuration(format!(
                "decrypt_window_days must be 1..={}, got {}",
                MAX_DURATION_DAYS, self.decrypt_window_days
            )));
        }
        if self.max_body_len == 0 {
            return Err(PulseError::Configuration("max_body_len must be positive".into()));
        }
        Ok(())
    }
}
