//! Position Snapshot Builder
//!
//! Reads every pool, user and asset value for one user concurrently and
//! assembles them into a [`PositionState`]. The build is fail-fast: the first
//! rejected read aborts it and nothing partial is returned.

use ledger_gateway::{AssetGateway, LedgerGateway};
use staking_core::{Address, GatewayError, SnapshotError};

use crate::state::{AssetInfo, PerPool, PoolConfig, PoolSnapshot, PositionState, UserPosition};

/// Build a full position state for `user`
pub async fn fetch_position_state<L, A>(
    ledger: &L,
    asset: &A,
    pools: &PerPool<PoolConfig>,
    user: &Address,
) -> Result<PositionState, SnapshotError>
where
    L: LedgerGateway,
    A: AssetGateway,
{
    let spender = ledger.ledger_address();

    let (native, asset_pool, meta, balance, allowance, native_balance, status) = tokio::try_join!(
        fetch_pool(ledger, &pools.native, user),
        fetch_pool(ledger, &pools.asset, user),
        asset.read_meta(),
        asset.read_balance(user),
        asset.read_allowance(user, spender),
        ledger.read_native_balance(user),
        ledger.read_status(),
    )?;

    let (native, asset_pool) = (native?, asset_pool?);

    tracing::debug!(
        user = %user,
        native_staked = native.position.staked,
        asset_staked = asset_pool.position.staked,
        allowance,
        "position reads settled"
    );

    Ok(PositionState {
        user: user.clone(),
        pools: PerPool {
            native,
            asset: asset_pool,
        },
        asset: AssetInfo {
            name: meta.name,
            symbol: meta.symbol,
            decimals: meta.decimals,
            total_supply: meta.total_supply,
            balance,
            allowance,
        },
        native_balance,
        ledger: status,
    })
}

/// Read one pool's info and the user's position in it.
///
/// Transport failures come back in the outer result so they join with the
/// other reads; an integrity failure is only checked once every read settled.
async fn fetch_pool<L: LedgerGateway>(
    ledger: &L,
    config: &PoolConfig,
    user: &Address,
) -> Result<Result<PoolSnapshot, SnapshotError>, GatewayError> {
    let pool = config.pool;
    let (info, staked, pending_reward, withdraw) = tokio::try_join!(
        ledger.read_pool(pool),
        ledger.read_staked(pool, user),
        ledger.read_pending_reward(pool, user),
        ledger.read_withdraw_amounts(pool, user),
    )?;

    if info.asset_address != config.asset_address {
        tracing::warn!(
            pool = %pool,
            ledger_asset = %info.asset_address,
            configured_asset = %config.asset_address,
            "ledger pool asset differs from configuration"
        );
    }

    Ok(
        UserPosition::from_ledger(pool, staked, pending_reward, withdraw).map(|position| {
            PoolSnapshot {
                config: config.clone(),
                info,
                position,
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::pool_configs;
    use ledger_gateway::memory::methods;
    use ledger_gateway::{AssetMeta, MemoryLedger, PoolParams};
    use staking_core::{PoolId, StakingConfig};

    fn setup() -> (MemoryLedger, PerPool<PoolConfig>, Address) {
        let config = StakingConfig::default();
        let ledger = MemoryLedger::new(
            config.ledger_address.clone(),
            config.asset_address.clone(),
            AssetMeta {
                name: "MetaNode".to_string(),
                symbol: "MNT".to_string(),
                decimals: 18,
                total_supply: 0,
            },
        );
        let user = Address::from_bytes([0xaa; 20]);
        ledger.fund_native(&user, 1_000);
        ledger.fund_asset(&user, 500);
        (ledger, pool_configs(&config), user)
    }

    #[tokio::test]
    async fn test_fetch_reads_every_pool() {
        let (ledger, pools, user) = setup();
        ledger.deposit_native(300, &user).await.unwrap();
        ledger.credit_reward(PoolId::Native, &user, 7);

        let state = fetch_position_state(&ledger, &ledger, &pools, &user)
            .await
            .unwrap();

        assert_eq!(state.user, user);
        assert_eq!(state.pools.native.position.staked, 300);
        assert_eq!(state.pools.native.position.pending_reward, 7);
        assert_eq!(state.pools.native.info.total_staked, 300);
        assert_eq!(state.pools.asset.position.staked, 0);
        assert_eq!(state.native_balance, 700);
        assert_eq!(state.asset.balance, 500);
        assert_eq!(state.asset.symbol, "MNT");
        assert_eq!(state.asset.allowance, 0);
        assert!(!state.ledger.paused);
    }

    #[tokio::test]
    async fn test_fetch_computes_withdraw_pending() {
        let (ledger, pools, user) = setup();
        ledger.configure_pool(
            PoolId::Native,
            PoolParams {
                unstake_lock_blocks: 5,
                ..PoolParams::default()
            },
        );
        ledger.deposit_native(100, &user).await.unwrap();
        ledger.request_unstake(PoolId::Native, 30, &user).await.unwrap();
        ledger.advance_blocks(5);
        ledger.request_unstake(PoolId::Native, 20, &user).await.unwrap();

        let state = fetch_position_state(&ledger, &ledger, &pools, &user)
            .await
            .unwrap();
        let position = state.pools.native.position;
        assert_eq!(position.withdraw_requested, 50);
        assert_eq!(position.withdraw_ready, 30);
        assert_eq!(position.withdraw_pending, 20);
    }

    #[tokio::test]
    async fn test_any_failed_read_fails_the_build() {
        let (ledger, pools, user) = setup();
        ledger.fail_read_in(PoolId::Asset, methods::PENDING_REWARD);

        let err = fetch_position_state(&ledger, &ledger, &pools, &user)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Read(GatewayError::Read {
                method: methods::PENDING_REWARD,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_asset_read_failure_fails_the_build() {
        let (ledger, pools, user) = setup();
        ledger.fail_read(methods::ALLOWANCE);

        let result = fetch_position_state(&ledger, &ledger, &pools, &user).await;
        assert!(matches!(result, Err(SnapshotError::Read(_))));
    }
}
