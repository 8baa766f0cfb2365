//! Configuration types for the staking engine

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SETTLE_DELAY_MS;
use crate::{Address, Error, Network, Result};

/// Default staking ledger contract address on devnet
const DEVNET_LEDGER_ADDRESS: [u8; 20] = [
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f,
    0x64, 0x18, 0x0a, 0xa3,
];

/// Default fungible asset contract address on devnet
const DEVNET_ASSET_ADDRESS: [u8; 20] = [
    0xe7, 0xf1, 0x72, 0x5e, 0x77, 0x34, 0xce, 0x28, 0x8f, 0x83, 0x67, 0xe1, 0xbb, 0x14, 0x3e, 0x90,
    0xbb, 0x3f, 0x05, 0x12,
];

/// Staking ledger and asset contract settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Staking ledger contract address (also the spender for asset approvals)
    pub ledger_address: Address,

    /// Fungible asset contract staked in the asset pool
    pub asset_address: Address,

    /// Delay before re-reading the ledger after a submitted operation
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            ledger_address: Address::from_bytes(DEVNET_LEDGER_ADDRESS),
            asset_address: Address::from_bytes(DEVNET_ASSET_ADDRESS),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    18545
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

/// A funded account on the in-process devnet ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevnetAccount {
    pub address: Address,

    /// Native balance as a decimal string (e.g. "10.5")
    #[serde(default)]
    pub native_balance: String,

    /// Fungible asset balance as a decimal string
    #[serde(default)]
    pub asset_balance: String,
}

/// Parameters for seeding the in-process devnet ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevnetConfig {
    #[serde(default)]
    pub accounts: Vec<DevnetAccount>,

    /// Blocks between an unstake request and the funds becoming withdrawable
    #[serde(default = "default_unstake_lock_blocks")]
    pub unstake_lock_blocks: u64,

    /// Minimum deposit per pool, as a decimal string
    #[serde(default = "default_min_deposit")]
    pub min_deposit: String,

    /// Reward minted per block across all pools, as a decimal string
    #[serde(default = "default_reward_per_block")]
    pub reward_per_block: String,

    /// Interval between produced blocks; 0 disables the block producer
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
}

fn default_unstake_lock_blocks() -> u64 {
    20
}

fn default_min_deposit() -> String {
    "0.01".to_string()
}

fn default_reward_per_block() -> String {
    "0.1".to_string()
}

fn default_block_interval_ms() -> u64 {
    12_000
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            unstake_lock_blocks: default_unstake_lock_blocks(),
            min_deposit: default_min_deposit(),
            reward_per_block: default_reward_per_block(),
            block_interval_ms: default_block_interval_ms(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network the ledger lives on
    pub network: Network,

    /// Ledger contract settings
    #[serde(default)]
    pub staking: StakingConfig,

    /// API server settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Devnet seeding (only used when `network` is devnet)
    #[serde(default)]
    pub devnet: DevnetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: Network::Devnet,
            staking: StakingConfig::default(),
            api: ApiConfig::default(),
            devnet: DevnetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.staking.asset_address.is_zero() {
            return Err(Error::Config(
                "asset_address must not be the zero address".to_string(),
            ));
        }
        if self.staking.ledger_address == self.staking.asset_address {
            return Err(Error::Config(
                "ledger_address and asset_address must differ".to_string(),
            ));
        }
        Ok(())
    }
}
