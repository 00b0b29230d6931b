//! Configuration management for ledgermesh

use crate::error::{ChainError, Result};
use crate::transaction::{Amount, MAX_TRANSACTION_SIZE};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::mempool::DEFAULT_MAX_POOL_SIZE;

/// Ledger parameters. Every field has a default so a partial (or absent)
/// config file still yields a usable configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Required number of leading zero hex digits in a block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    /// Base reward minted per mined block, before fees.
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,
    #[serde(default = "default_max_transaction_bytes")]
    pub max_transaction_bytes: usize,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
}

impl ChainConfig {
    /// The mining reward as a fixed-point amount. NaN, infinities, and
    /// values outside the fixed-point range are config errors, not panics.
    pub fn reward_amount(&self) -> Result<Amount> {
        Amount::checked_from_num(self.mining_reward).ok_or_else(|| {
            ChainError::ConfigError(format!(
                "mining_reward {} is not representable as a fixed-point amount",
                self.mining_reward
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.mining_reward < 0.0 {
            return Err(ChainError::ConfigError(
                "mining_reward must be non-negative".to_string(),
            ));
        }
        self.reward_amount()?;
        if self.max_pool_size == 0 {
            return Err(ChainError::ConfigError(
                "max_pool_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            max_transaction_bytes: default_max_transaction_bytes(),
            max_pool_size: default_max_pool_size(),
        }
    }
}

fn default_difficulty() -> u32 {
    4
}

fn default_mining_reward() -> f64 {
    100.0
}

fn default_max_transaction_bytes() -> usize {
    MAX_TRANSACTION_SIZE
}

fn default_max_pool_size() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

/// Loads a [`ChainConfig`] from a TOML file, falling back to defaults when
/// the file is absent or empty.
pub fn load_config(path: impl AsRef<Path>) -> Result<ChainConfig> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: ChainConfig = if config_str.is_empty() {
        ChainConfig::default()
    } else {
        toml::from_str(&config_str).map_err(|e| ChainError::ConfigError(e.to_string()))?
    };

    config.validate()?;
    Ok(config)
}
