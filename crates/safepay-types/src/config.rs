//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{AccountId, Result, SafepayError, constants};

/// Configuration for a payment engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ledger account that holds all escrowed value.
    pub escrow_account: AccountId,
    /// Largest validator set a single payment may name.
    pub max_validators: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escrow_account: AccountId::deterministic(constants::ESCROW_ACCOUNT_TAG),
            max_validators: constants::DEFAULT_MAX_VALIDATORS,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SafepayError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_validators == 0 {
            return Err(SafepayError::Configuration(
                "max_validators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
