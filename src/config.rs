//! Configuration Module
//!
//! This module defines all configuration structures for the batcher.
//! Configuration is loaded from TOML files and parsed using serde.

use ethers::types::Address;
use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [params]
/// average_block_time_ms = 5000
/// average_foreign_block_time_ms = 15000
/// target_batch_timeout_ms = 43200000
/// max_batch_size = 100
/// batch_creation_period = 10
///
/// [bridge]
/// contract_address = "0x8858eeb3dfffa017d4bce9801d340d36cf895ccf"
/// chain_id = 1
///
/// [api]
/// host = "127.0.0.1"
/// port = 8545
///
/// [database]
/// url = "sqlite://registry.db"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub params: Params,
    pub bridge: BridgeConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
}

/// Module parameters
///
/// # Fields
/// - `average_block_time_ms`: average home-chain block time
/// - `average_foreign_block_time_ms`: average foreign-chain block time
/// - `target_batch_timeout_ms`: how long a batch should stay executable
/// - `max_batch_size`: maximum number of transfers per batch
/// - `batch_creation_period`: batches are built every this many home blocks
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    pub average_block_time_ms: u64,
    pub average_foreign_block_time_ms: u64,
    pub target_batch_timeout_ms: u64,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_batch_creation_period")]
    pub batch_creation_period: u64,
}

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_batch_creation_period() -> u64 {
    10
}

impl Default for Params {
    fn default() -> Self {
        Self {
            average_block_time_ms: 5_000,
            average_foreign_block_time_ms: 15_000,
            target_batch_timeout_ms: 43_200_000,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_creation_period: default_batch_creation_period(),
        }
    }
}

/// Identity of the bridge, carried on every batch notification
///
/// # Fields
/// - `contract_address`: bridge contract on the foreign chain
/// - `chain_id`: foreign chain id the contract lives on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    pub contract_address: Address,
    pub chain_id: u64,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on (e.g., 8545)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
///
/// Settings for the batch event registry database.
///
/// # Fields
/// - `url`: Database connection URL (e.g., "sqlite://registry.db")
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// let config = batcher::Config::load("config/default.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.params.average_block_time_ms == 0 || self.params.average_foreign_block_time_ms == 0 {
            anyhow::bail!("average block times must be non-zero");
        }
        if self.params.batch_creation_period == 0 {
            anyhow::bail!("batch_creation_period must be non-zero");
        }
        Ok(())
    }
}
