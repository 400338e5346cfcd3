use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blockchain::amount::{Amount, AmountError};
use crate::blockchain::pow::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV: &str = "LEDGER_CONFIG";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid amount for {key}: {source}")]
    InvalidAmount { key: String, source: AmountError },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Two-line JSON snapshot file
    Snapshot,
    /// sled database directory
    Sled,
    /// Nothing is written to disk
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Identifier credited with mining rewards
    pub owner: String,
    /// Leading zero hex characters required of a proof
    pub difficulty: usize,
    /// Reward minted per block, in minor units
    pub mining_reward: Amount,
    pub mining_threads: usize,
    /// Abandon a proof search after this many seconds
    pub mining_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            owner: "Max".to_string(),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: Amount::from_coins(10),
            mining_threads: 1,
            mining_timeout_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Snapshot,
            path: PathBuf::from("data/blockchain.txt"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl LedgerConfig {
    pub fn mining_timeout(&self) -> Option<Duration> {
        self.mining_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Optional JSON config file; falls back to `LEDGER_CONFIG`
    ///
    /// # Returns
    ///
    /// The validated configuration
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `LEDGER_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(owner) = lookup("LEDGER_OWNER") {
            self.ledger.owner = owner;
        }
        if let Some(value) = lookup("LEDGER_DIFFICULTY") {
            self.ledger.difficulty = parse_value("LEDGER_DIFFICULTY", &value)?;
        }
        if let Some(value) = lookup("LEDGER_MINING_THREADS") {
            self.ledger.mining_threads = parse_value("LEDGER_MINING_THREADS", &value)?;
        }
        if let Some(value) = lookup("LEDGER_MINING_REWARD") {
            self.ledger.mining_reward =
                value.parse().map_err(|source| ConfigError::InvalidAmount {
                    key: "LEDGER_MINING_REWARD".to_string(),
                    source,
                })?;
        }
        if let Some(value) = lookup("LEDGER_DATA_PATH") {
            self.storage.path = PathBuf::from(value);
        }
        if let Some(value) = lookup("LEDGER_PORT") {
            self.api.port = parse_value("LEDGER_PORT", &value)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        };

        if self.ledger.owner.trim().is_empty() {
            return Err(invalid("ledger.owner", self.ledger.owner.clone()));
        }
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(invalid("ledger.difficulty", self.ledger.difficulty.to_string()));
        }
        if self.ledger.mining_threads == 0 {
            return Err(invalid("ledger.mining_threads", "0".to_string()));
        }
        if !self.ledger.mining_reward.is_positive() {
            return Err(invalid(
                "ledger.mining_reward",
                self.ledger.mining_reward.to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
