//! Pool descriptors and UI presets

use staking_core::constants::NATIVE_DECIMALS;
use staking_core::{Address, PoolId, StakingConfig};

use crate::state::{PerPool, PoolConfig};

pub const NATIVE_POOL_NAME: &str = "ETH Pool";
pub const NATIVE_POOL_SYMBOL: &str = "ETH";

pub const ASSET_POOL_NAME: &str = "MetaNode Pool";
pub const ASSET_POOL_SYMBOL: &str = "MNT";
pub const ASSET_POOL_DECIMALS: u8 = 18;

/// Share of the native balance kept back for gas when staking the maximum
pub const NATIVE_GAS_RESERVE_PCT: u128 = 1;

/// Quick-fill presets: (label, percent of wallet balance)
pub const AMOUNT_PRESETS: &[(&str, u32)] = &[("25%", 25), ("50%", 50), ("75%", 75), ("Max", 100)];

/// Static descriptor for one pool
pub fn pool_config(pool: PoolId, staking: &StakingConfig) -> PoolConfig {
    match pool {
        PoolId::Native => PoolConfig {
            pool,
            name: NATIVE_POOL_NAME.to_string(),
            symbol: NATIVE_POOL_SYMBOL.to_string(),
            decimals: NATIVE_DECIMALS,
            asset_address: Address::zero(),
            is_native: true,
        },
        PoolId::Asset => PoolConfig {
            pool,
            name: ASSET_POOL_NAME.to_string(),
            symbol: ASSET_POOL_SYMBOL.to_string(),
            decimals: ASSET_POOL_DECIMALS,
            asset_address: staking.asset_address.clone(),
            is_native: false,
        },
    }
}

/// Descriptors for every pool
pub fn pool_configs(staking: &StakingConfig) -> PerPool<PoolConfig> {
    PerPool::from_fn(|pool| pool_config(pool, staking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_pool_uses_zero_address() {
        let configs = pool_configs(&StakingConfig::default());
        assert!(configs.native.is_native);
        assert!(configs.native.asset_address.is_zero());
        assert_eq!(configs.native.symbol, "ETH");
    }

    #[test]
    fn test_asset_pool_takes_configured_address() {
        let staking = StakingConfig::default();
        let configs = pool_configs(&staking);
        assert!(!configs.asset.is_native);
        assert_eq!(configs.asset.asset_address, staking.asset_address);
        assert_eq!(configs.get(PoolId::Asset).name, "MetaNode Pool");
    }

    #[test]
    fn test_presets_end_at_max() {
        assert_eq!(AMOUNT_PRESETS.last(), Some(&("Max", 100)));
    }
}
