//! Snapshot state types
//!
//! A [`Snapshot`] is immutable once built. Every derived accessor here is a
//! pure function of the snapshot it is called on.

use ledger_gateway::{LedgerStatus, PoolInfo, WithdrawAmounts};
use serde::{Deserialize, Serialize};
use staking_core::{
    Address, Amount, GatewayError, PoolId, ProtocolError, SnapshotError, TxHash,
};

/// One value per pool, with exhaustive access by [`PoolId`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerPool<T> {
    pub native: T,
    pub asset: T,
}

impl<T> PerPool<T> {
    pub fn from_fn(mut f: impl FnMut(PoolId) -> T) -> Self {
        Self {
            native: f(PoolId::Native),
            asset: f(PoolId::Asset),
        }
    }

    pub fn get(&self, pool: PoolId) -> &T {
        match pool {
            PoolId::Native => &self.native,
            PoolId::Asset => &self.asset,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &T)> {
        PoolId::ALL.into_iter().map(move |pool| (pool, self.get(pool)))
    }
}

/// Static pool descriptor, derived from configuration once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub pool: PoolId,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Zero address for the native asset
    pub asset_address: Address,
    pub is_native: bool,
}

/// A user's position in one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosition {
    pub staked: Amount,
    pub pending_reward: Amount,
    pub withdraw_requested: Amount,
    pub withdraw_ready: Amount,
    /// `withdraw_requested - withdraw_ready`
    pub withdraw_pending: Amount,
}

impl UserPosition {
    /// Assemble a position from ledger reads.
    ///
    /// A ready amount larger than the requested amount means the reads are
    /// stale or corrupt and is reported, never clamped.
    pub fn from_ledger(
        pool: PoolId,
        staked: Amount,
        pending_reward: Amount,
        withdraw: WithdrawAmounts,
    ) -> Result<Self, SnapshotError> {
        let withdraw_pending = withdraw.requested.checked_sub(withdraw.ready).ok_or(
            SnapshotError::DataIntegrity {
                pool,
                requested: withdraw.requested,
                ready: withdraw.ready,
            },
        )?;

        Ok(Self {
            staked,
            pending_reward,
            withdraw_requested: withdraw.requested,
            withdraw_ready: withdraw.ready,
            withdraw_pending,
        })
    }
}

/// Fungible asset metadata plus the user's balance and ledger allowance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Amount,
    pub balance: Amount,
    /// Allowance granted to the ledger contract
    pub allowance: Amount,
}

/// Everything read for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub config: PoolConfig,
    pub info: PoolInfo,
    pub position: UserPosition,
}

/// One consistent read of all pool, user and asset state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    pub user: Address,
    pub pools: PerPool<PoolSnapshot>,
    pub asset: AssetInfo,
    pub native_balance: Amount,
    pub ledger: LedgerStatus,
}

/// Immutable snapshot held by the engine.
///
/// `state` is `None` until the first successful build for the connected user.
/// A failed build republishes the previous `state` with `error` set.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub state: Option<PositionState>,
    pub error: Option<SnapshotError>,
}

impl Snapshot {
    /// Snapshot with no data, held before connect and after disconnect
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            state: None,
            error: None,
        }
    }

    pub fn loaded(version: u64, state: PositionState) -> Self {
        Self {
            version,
            state: Some(state),
            error: None,
        }
    }

    /// Same data, flagged with a failed refresh
    pub fn with_error(&self, version: u64, error: SnapshotError) -> Self {
        Self {
            version,
            state: self.state.clone(),
            error: Some(error),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn user(&self) -> Option<&Address> {
        self.state.as_ref().map(|s| &s.user)
    }

    pub fn pool(&self, pool: PoolId) -> Option<&PoolSnapshot> {
        self.state.as_ref().map(|s| s.pools.get(pool))
    }

    pub fn pool_info(&self, pool: PoolId) -> Option<&PoolInfo> {
        self.pool(pool).map(|p| &p.info)
    }

    /// The user's position, zeroed when nothing is loaded
    pub fn position(&self, pool: PoolId) -> UserPosition {
        self.pool(pool).map(|p| p.position).unwrap_or_default()
    }

    pub fn staked(&self, pool: PoolId) -> Amount {
        self.position(pool).staked
    }

    pub fn pending_reward(&self, pool: PoolId) -> Amount {
        self.position(pool).pending_reward
    }

    pub fn withdraw_requested(&self, pool: PoolId) -> Amount {
        self.position(pool).withdraw_requested
    }

    pub fn withdraw_ready(&self, pool: PoolId) -> Amount {
        self.position(pool).withdraw_ready
    }

    pub fn withdraw_pending(&self, pool: PoolId) -> Amount {
        self.position(pool).withdraw_pending
    }

    pub fn asset(&self) -> Option<&AssetInfo> {
        self.state.as_ref().map(|s| &s.asset)
    }

    pub fn ledger_status(&self) -> Option<&LedgerStatus> {
        self.state.as_ref().map(|s| &s.ledger)
    }

    /// Wallet balance of the asset staked in `pool`
    pub fn wallet_balance(&self, pool: PoolId) -> Amount {
        match &self.state {
            Some(state) if pool.is_native() => state.native_balance,
            Some(state) => state.asset.balance,
            None => 0,
        }
    }

    pub fn stats(&self, pool: PoolId) -> PoolStats {
        let position = self.position(pool);
        PoolStats {
            pool,
            staked: position.staked,
            pending_reward: position.pending_reward,
            withdraw_pending: position.withdraw_pending,
            withdraw_ready: position.withdraw_ready,
        }
    }

    /// Per-pool stats plus totals summed across the fixed pool set
    pub fn summary(&self) -> StatsSummary {
        let per_pool = PerPool::from_fn(|pool| self.stats(pool));
        let totals = per_pool
            .iter()
            .fold(Totals::default(), |acc, (_, stats)| acc.add(stats));

        StatsSummary {
            native: per_pool.native,
            asset: per_pool.asset,
            totals,
        }
    }
}

/// Derived statistics for one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub pool: PoolId,
    pub staked: Amount,
    pub pending_reward: Amount,
    pub withdraw_pending: Amount,
    pub withdraw_ready: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub staked: Amount,
    pub pending_reward: Amount,
    pub withdraw_pending: Amount,
    pub withdraw_ready: Amount,
}

impl Totals {
    fn add(self, stats: &PoolStats) -> Self {
        Self {
            staked: self.staked + stats.staked,
            pending_reward: self.pending_reward + stats.pending_reward,
            withdraw_pending: self.withdraw_pending + stats.withdraw_pending,
            withdraw_ready: self.withdraw_ready + stats.withdraw_ready,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub native: PoolStats,
    pub asset: PoolStats,
    pub totals: Totals,
}

/// Operations that submit a write to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Approve,
    Stake,
    Unstake,
    Withdraw,
    Claim,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Stake => "stake",
            Self::Unstake => "unstake",
            Self::Withdraw => "withdraw",
            Self::Claim => "claim",
        }
    }
}

/// Where an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// No connected user
    NotReady,
    /// Rejected locally before any ledger call
    Precondition,
    /// A point read needed by the operation failed
    Read,
    /// The ledger simulation or submission was rejected
    Submission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub code: &'static str,
    pub message: String,
}

impl OperationFailure {
    pub fn not_ready() -> Self {
        Self {
            kind: FailureKind::NotReady,
            code: "not_ready",
            message: "Wallet not connected".to_string(),
        }
    }

    pub fn precondition(error: &ProtocolError) -> Self {
        let kind = match error {
            ProtocolError::NotReady { .. } => FailureKind::NotReady,
            _ => FailureKind::Precondition,
        };
        Self {
            kind,
            code: error.error_code(),
            message: error.to_string(),
        }
    }

    pub fn read(error: &GatewayError) -> Self {
        Self {
            kind: FailureKind::Read,
            code: error.error_code(),
            message: error.to_string(),
        }
    }

    pub fn submission(error: &GatewayError) -> Self {
        Self {
            kind: FailureKind::Submission,
            code: error.error_code(),
            message: error.to_string(),
        }
    }
}

/// Outcome of an approval or lifecycle call. Exactly one tag per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OperationResult {
    Success { tx_hash: TxHash },
    /// Asset deposit blocked by insufficient allowance; nothing was submitted
    NeedsApproval { required: Amount, allowance: Amount },
    Failure(OperationFailure),
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn needs_approval(&self) -> bool {
        matches!(self, Self::NeedsApproval { .. })
    }

    pub fn tx_hash(&self) -> Option<&TxHash> {
        match self {
            Self::Success { tx_hash } => Some(tx_hash),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&OperationFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}
