//! Aggregation Facade
//!
//! [`StakingEngine`] owns the connected user and the single live
//! [`Snapshot`]. A refresh builds a new snapshot and swaps the held `Arc`;
//! the snapshot is never edited in place, so readers see either the old or
//! the new value in full.
//!
//! Concurrent refreshes race and the last one to finish wins. Lifecycle
//! calls are not serialized; per-(pool, operation) busy flags let callers
//! disable their own controls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ledger_gateway::{AssetGateway, LedgerGateway, LedgerStatus, PoolInfo};
use staking_core::{Address, Amount, PoolId, SnapshotError, StakingConfig};
use tokio::sync::RwLock;

use crate::constants::pool_configs;
use crate::fetch::fetch_position_state;
use crate::state::{
    OperationFailure, OperationKind, OperationResult, PerPool, PoolConfig, PoolStats, Snapshot,
    StatsSummary,
};
use crate::{approval, lifecycle};

/// Multi-pool staking engine
pub struct StakingEngine<L, A> {
    inner: Arc<EngineInner<L, A>>,
}

impl<L, A> Clone for StakingEngine<L, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<L, A> {
    ledger: Arc<L>,
    asset: Arc<A>,
    pools: PerPool<PoolConfig>,
    settle_delay: Duration,
    user: RwLock<Option<Address>>,
    snapshot: RwLock<Arc<Snapshot>>,
    versions: AtomicU64,
    in_flight: AtomicUsize,
    busy: Mutex<HashMap<(PoolId, OperationKind), usize>>,
}

/// Counts a snapshot build as in flight until dropped
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

type BusyMap = Mutex<HashMap<(PoolId, OperationKind), usize>>;

/// Marks one (pool, operation) as outstanding until dropped
struct BusyGuard<'a> {
    busy: &'a BusyMap,
    key: (PoolId, OperationKind),
}

impl<'a> BusyGuard<'a> {
    fn enter(busy: &'a BusyMap, pool: PoolId, op: OperationKind) -> Self {
        let key = (pool, op);
        *busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(0) += 1;
        Self { busy, key }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = busy.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                busy.remove(&self.key);
            }
        }
    }
}

impl<L, A> StakingEngine<L, A>
where
    L: LedgerGateway,
    A: AssetGateway,
{
    pub fn new(ledger: Arc<L>, asset: Arc<A>, config: &StakingConfig) -> Self {
        if ledger.ledger_address() != &config.ledger_address {
            tracing::warn!(
                gateway = %ledger.ledger_address(),
                configured = %config.ledger_address,
                "ledger gateway address differs from configuration"
            );
        }
        if asset.asset_address() != &config.asset_address {
            tracing::warn!(
                gateway = %asset.asset_address(),
                configured = %config.asset_address,
                "asset gateway address differs from configuration"
            );
        }

        Self {
            inner: Arc::new(EngineInner {
                ledger,
                asset,
                pools: pool_configs(config),
                settle_delay: Duration::from_millis(config.settle_delay_ms),
                user: RwLock::new(None),
                snapshot: RwLock::new(Arc::new(Snapshot::empty(0))),
                versions: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                busy: Mutex::new(HashMap::new()),
            }),
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect `user` and build their first snapshot.
    ///
    /// Switching to a different user discards the previous user's snapshot
    /// before the new build starts.
    pub async fn connect(&self, user: Address) -> Arc<Snapshot> {
        {
            let mut current = self.inner.user.write().await;
            if current.as_ref() != Some(&user) {
                tracing::info!(user = %user, "wallet connected");
                *current = Some(user);
                self.publish(|version, _| Snapshot::empty(version)).await;
            }
        }
        self.refresh().await
    }

    pub async fn disconnect(&self) {
        let mut current = self.inner.user.write().await;
        if let Some(user) = current.take() {
            tracing::info!(user = %user, "wallet disconnected");
            self.publish(|version, _| Snapshot::empty(version)).await;
        }
    }

    pub async fn user(&self) -> Option<Address> {
        self.inner.user.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.user.read().await.is_some()
    }

    /// False while no user is connected
    pub async fn is_ready(&self) -> bool {
        self.is_connected().await
    }

    /// True while any snapshot build is in flight
    pub fn is_loading(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    /// True while an operation of kind `op` on `pool` is outstanding
    pub fn is_busy(&self, pool: PoolId, op: OperationKind) -> bool {
        self.inner
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(pool, op))
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Swap in a new snapshot built from the held one, stamped with the next version
    async fn publish(&self, build: impl FnOnce(u64, &Snapshot) -> Snapshot) -> Arc<Snapshot> {
        let mut held = self.inner.snapshot.write().await;
        let version = self.inner.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let next = Arc::new(build(version, &held));
        *held = Arc::clone(&next);
        next
    }

    /// Re-read all state for the connected user.
    ///
    /// Without a user this returns the held snapshot unchanged. A failed
    /// build keeps the held values and sets the error flag. A build whose
    /// user was disconnected or replaced mid-flight is dropped.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let Some(user) = self.user().await else {
            tracing::debug!("refresh skipped, no wallet connected");
            return self.snapshot().await;
        };

        let result = {
            let _loading = LoadingGuard::enter(&self.inner.in_flight);
            fetch_position_state(
                self.inner.ledger.as_ref(),
                self.inner.asset.as_ref(),
                &self.inner.pools,
                &user,
            )
            .await
        };

        let current = self.inner.user.read().await;
        if current.as_ref() != Some(&user) {
            tracing::debug!(user = %user, "discarding snapshot for stale user");
            drop(current);
            return self.snapshot().await;
        }

        match result {
            Ok(state) => {
                let snapshot = self
                    .publish(|version, _| Snapshot::loaded(version, state))
                    .await;
                tracing::info!(user = %user, version = snapshot.version, "snapshot refreshed");
                snapshot
            }
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "snapshot refresh failed, keeping previous values");
                self.publish(|version, held| held.with_error(version, e))
                    .await
            }
        }
    }

    /// Refresh after the settle delay, on the runtime
    fn schedule_refresh(&self) {
        let engine = self.clone();
        let delay = self.inner.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.refresh().await;
        });
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.inner.snapshot.read().await)
    }

    /// Error from the latest refresh, if it failed
    pub async fn last_error(&self) -> Option<SnapshotError> {
        self.snapshot().await.error.clone()
    }

    pub async fn staked(&self, pool: PoolId) -> Amount {
        self.snapshot().await.staked(pool)
    }

    pub async fn pending_reward(&self, pool: PoolId) -> Amount {
        self.snapshot().await.pending_reward(pool)
    }

    pub async fn withdraw_pending(&self, pool: PoolId) -> Amount {
        self.snapshot().await.withdraw_pending(pool)
    }

    pub async fn withdraw_ready(&self, pool: PoolId) -> Amount {
        self.snapshot().await.withdraw_ready(pool)
    }

    pub async fn pool_stats(&self, pool: PoolId) -> PoolStats {
        self.snapshot().await.stats(pool)
    }

    pub async fn summary(&self) -> StatsSummary {
        self.snapshot().await.summary()
    }

    pub async fn pool_info(&self, pool: PoolId) -> Option<PoolInfo> {
        self.snapshot().await.pool_info(pool).cloned()
    }

    pub async fn ledger_status(&self) -> Option<LedgerStatus> {
        self.snapshot().await.ledger_status().cloned()
    }

    pub fn pool_config(&self, pool: PoolId) -> &PoolConfig {
        self.inner.pools.get(pool)
    }

    pub fn pools(&self) -> &PerPool<PoolConfig> {
        &self.inner.pools
    }

    // =========================================================================
    // Approval
    // =========================================================================

    /// Whether staking `amount` into `pool` needs an approval first.
    ///
    /// Always false for the native pool. The asset pool reads the allowance
    /// fresh rather than from the snapshot.
    pub async fn needs_approval(
        &self,
        pool: PoolId,
        amount: Amount,
    ) -> Result<bool, OperationFailure> {
        if pool.is_native() {
            return Ok(false);
        }
        let user = self.user().await.ok_or_else(OperationFailure::not_ready)?;
        approval::needs_approval(
            self.inner.asset.as_ref(),
            self.inner.ledger.ledger_address(),
            &user,
            pool,
            amount,
        )
        .await
        .map_err(|e| OperationFailure::read(&e))
    }

    /// Approve the ledger for exactly `amount` of the asset
    pub async fn approve(&self, amount: Amount) -> OperationResult {
        let Some(user) = self.user().await else {
            return OperationResult::Failure(OperationFailure::not_ready());
        };
        let _busy = BusyGuard::enter(&self.inner.busy, PoolId::Asset, OperationKind::Approve);

        let result = approval::approve(
            self.inner.asset.as_ref(),
            self.inner.ledger.ledger_address(),
            &user,
            amount,
        )
        .await;
        self.settle(&result);
        result
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub async fn stake(&self, pool: PoolId, amount: Amount) -> OperationResult {
        let Some(user) = self.user().await else {
            return OperationResult::Failure(OperationFailure::not_ready());
        };
        let _busy = BusyGuard::enter(&self.inner.busy, pool, OperationKind::Stake);
        let snapshot = self.snapshot().await;

        let result = lifecycle::stake(
            self.inner.ledger.as_ref(),
            self.inner.asset.as_ref(),
            &snapshot,
            &user,
            pool,
            amount,
        )
        .await;
        self.settle(&result);
        result
    }

    pub async fn unstake(&self, pool: PoolId, amount: Amount) -> OperationResult {
        let Some(user) = self.user().await else {
            return OperationResult::Failure(OperationFailure::not_ready());
        };
        let _busy = BusyGuard::enter(&self.inner.busy, pool, OperationKind::Unstake);
        let snapshot = self.snapshot().await;

        let result =
            lifecycle::unstake(self.inner.ledger.as_ref(), &snapshot, &user, pool, amount).await;
        self.settle(&result);
        result
    }

    pub async fn withdraw(&self, pool: PoolId) -> OperationResult {
        let Some(user) = self.user().await else {
            return OperationResult::Failure(OperationFailure::not_ready());
        };
        let _busy = BusyGuard::enter(&self.inner.busy, pool, OperationKind::Withdraw);
        let snapshot = self.snapshot().await;

        let result = lifecycle::withdraw(self.inner.ledger.as_ref(), &snapshot, &user, pool).await;
        self.settle(&result);
        result
    }

    pub async fn claim(&self, pool: PoolId) -> OperationResult {
        let Some(user) = self.user().await else {
            return OperationResult::Failure(OperationFailure::not_ready());
        };
        let _busy = BusyGuard::enter(&self.inner.busy, pool, OperationKind::Claim);
        let snapshot = self.snapshot().await;

        let result = lifecycle::claim(self.inner.ledger.as_ref(), &snapshot, &user, pool).await;
        self.settle(&result);
        result
    }

    /// Accepted writes get a delayed refresh; failures leave the snapshot alone
    fn settle(&self, result: &OperationResult) {
        if result.is_success() {
            self.schedule_refresh();
        }
    }
}
