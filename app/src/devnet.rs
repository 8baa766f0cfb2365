//! In-process devnet
//!
//! Seeds a [`MemoryLedger`] from configuration and keeps its block clock
//! running so unstake locks elapse and rewards accrue without a real chain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledger_gateway::{AssetMeta, MemoryLedger, PoolParams};
use multipool::constants::{ASSET_POOL_DECIMALS, ASSET_POOL_SYMBOL};
use multipool::parse_amount;
use staking_core::constants::NATIVE_DECIMALS;
use staking_core::{AppConfig, PoolId, Result};

const ASSET_NAME: &str = "MetaNode";

/// Build a ledger with both pools configured and every devnet account funded
pub fn seed_ledger(config: &AppConfig) -> Result<MemoryLedger> {
    let devnet = &config.devnet;
    let ledger = MemoryLedger::new(
        config.staking.ledger_address.clone(),
        config.staking.asset_address.clone(),
        AssetMeta {
            name: ASSET_NAME.to_string(),
            symbol: ASSET_POOL_SYMBOL.to_string(),
            decimals: ASSET_POOL_DECIMALS,
            total_supply: 0,
        },
    );

    for pool in PoolId::ALL {
        let decimals = if pool.is_native() {
            NATIVE_DECIMALS
        } else {
            ASSET_POOL_DECIMALS
        };
        ledger.configure_pool(
            pool,
            PoolParams {
                min_deposit: parse_amount(&devnet.min_deposit, decimals)?,
                unstake_lock_blocks: devnet.unstake_lock_blocks,
                ..PoolParams::default()
            },
        );
    }
    ledger.set_reward_per_block(parse_amount(&devnet.reward_per_block, ASSET_POOL_DECIMALS)?);

    for account in &devnet.accounts {
        let native = parse_or_zero(&account.native_balance, NATIVE_DECIMALS)?;
        let asset = parse_or_zero(&account.asset_balance, ASSET_POOL_DECIMALS)?;
        ledger.fund_native(&account.address, native);
        ledger.fund_asset(&account.address, asset);
        tracing::info!(
            address = %account.address,
            native = %account.native_balance,
            asset = %account.asset_balance,
            "funded devnet account"
        );
    }

    Ok(ledger)
}

fn parse_or_zero(text: &str, decimals: u8) -> Result<u128> {
    if text.trim().is_empty() {
        return Ok(0);
    }
    Ok(parse_amount(text, decimals)?)
}

/// Background task mining one block per interval
#[derive(Default)]
pub struct BlockProducer {
    running: Arc<AtomicBool>,
}

impl BlockProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start mining on `ledger`. A second call while running is a no-op.
    pub fn start(&self, ledger: Arc<MemoryLedger>, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                ledger.mine_block();
                tracing::trace!(block = ledger.current_block(), "devnet block mined");
            }
            tracing::debug!("devnet block producer stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_gateway::{AssetGateway, LedgerGateway};
    use staking_core::{Address, DevnetAccount};

    fn account(byte: u8, native: &str, asset: &str) -> DevnetAccount {
        DevnetAccount {
            address: Address::from_bytes([byte; 20]),
            native_balance: native.to_string(),
            asset_balance: asset.to_string(),
        }
    }

    #[tokio::test]
    async fn test_seed_funds_accounts_and_pools() {
        let mut config = AppConfig::default();
        config.devnet.accounts = vec![account(0xaa, "10.5", "100"), account(0xbb, "", "1")];
        config.devnet.unstake_lock_blocks = 7;

        let ledger = seed_ledger(&config).unwrap();
        let a = Address::from_bytes([0xaa; 20]);
        let b = Address::from_bytes([0xbb; 20]);

        assert_eq!(
            ledger.read_native_balance(&a).await.unwrap(),
            10_500_000_000_000_000_000
        );
        assert_eq!(ledger.read_native_balance(&b).await.unwrap(), 0);
        assert_eq!(
            ledger.read_balance(&b).await.unwrap(),
            1_000_000_000_000_000_000
        );

        let pool = ledger.read_pool(PoolId::Asset).await.unwrap();
        assert_eq!(pool.unstake_lock_blocks, 7);
        assert_eq!(pool.min_deposit, 10_000_000_000_000_000);
        assert_eq!(pool.asset_address, config.staking.asset_address);
    }

    #[test]
    fn test_bad_balance_is_config_error() {
        let mut config = AppConfig::default();
        config.devnet.accounts = vec![account(0xaa, "ten", "0")];
        let err = seed_ledger(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid amount"));
    }

    #[tokio::test]
    async fn test_block_producer_advances_clock() {
        let ledger = Arc::new(seed_ledger(&AppConfig::default()).unwrap());
        let start = ledger.current_block();
        let producer = BlockProducer::new();

        producer.start(Arc::clone(&ledger), Duration::from_millis(5));
        assert!(producer.is_running());
        tokio::time::sleep(Duration::from_millis(100)).await;
        producer.stop();

        assert!(ledger.current_block() > start);
    }

    #[tokio::test]
    async fn test_block_producer_survives_large_stake() {
        let mut config = AppConfig::default();
        config.devnet.accounts = vec![account(0xaa, "20000", "")];
        let ledger = Arc::new(seed_ledger(&config).unwrap());
        let whale = Address::from_bytes([0xaa; 20]);
        ledger
            .deposit_native(parse_amount("10000", NATIVE_DECIMALS).unwrap(), &whale)
            .await
            .unwrap();

        let start = ledger.current_block();
        let producer = BlockProducer::new();
        producer.start(Arc::clone(&ledger), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mid = ledger.current_block();
        tokio::time::sleep(Duration::from_millis(50)).await;
        producer.stop();

        // still mining after the first rewarded blocks
        assert!(mid > start);
        assert!(ledger.current_block() > mid);
        let pending = ledger.read_pending_reward(PoolId::Native, &whale).await.unwrap();
        assert!(pending > 0);
    }
}
