//! Data Transfer Objects for API requests and responses
//!
//! Amounts are decimal strings in the pool asset's units ("1.5"), never raw
//! integers, so clients need no big-number handling.

use axum::http::StatusCode;
use ledger_gateway::LedgerStatus;
use multipool::{
    format_amount, preset_amount, AssetInfo, FailureKind, OperationFailure, OperationResult,
    PoolConfig, PoolStats, Snapshot, StatsSummary, Totals, AMOUNT_PRESETS,
};
use serde::{Deserialize, Serialize};
use multipool::constants::ASSET_POOL_DECIMALS;
use staking_core::{PoolId, ProtocolError, SnapshotError};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Handler error: HTTP status plus JSON body
pub type ApiResult<T> = Result<axum::Json<T>, (StatusCode, axum::Json<ApiError>)>;

impl From<&ProtocolError> for ApiError {
    fn from(e: &ProtocolError) -> Self {
        Self::new(e.error_code(), e.to_string())
    }
}

impl From<&SnapshotError> for ApiError {
    fn from(e: &SnapshotError) -> Self {
        Self::new(e.error_code(), e.to_string())
    }
}

impl From<&OperationFailure> for ApiError {
    fn from(f: &OperationFailure) -> Self {
        Self::new(f.code, f.message.clone())
    }
}

/// HTTP status for a failed operation
pub fn failure_status(failure: &OperationFailure) -> StatusCode {
    match failure.kind {
        FailureKind::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Precondition if failure.code == "invalid_amount" => StatusCode::BAD_REQUEST,
        FailureKind::Precondition => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::Read => StatusCode::BAD_GATEWAY,
        FailureKind::Submission if failure.code == "simulation_reverted" => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FailureKind::Submission => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// Wallet DTOs
// =============================================================================

/// Wallet connection request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// 0x-prefixed account address
    pub address: String,
}

/// Wallet status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub connected: bool,
    pub address: Option<String>,
    pub network: String,
    /// Seconds since the wallet was connected
    pub connected_secs: Option<u64>,
}

// =============================================================================
// Snapshot DTOs
// =============================================================================

/// Quick-fill amount for a pool's stake input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetDto {
    pub label: String,
    pub amount: String,
}

/// One pool with the connected user's position in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolDto {
    pub pool: PoolId,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub is_native: bool,
    pub asset_address: String,
    pub staked: String,
    pub pending_reward: String,
    pub withdraw_requested: String,
    pub withdraw_ready: String,
    pub withdraw_pending: String,
    pub wallet_balance: String,
    pub total_staked: Option<String>,
    pub min_deposit: Option<String>,
    pub pool_weight: Option<String>,
    pub unstake_lock_blocks: Option<u64>,
    pub presets: Vec<PresetDto>,
}

impl PoolDto {
    pub fn from_snapshot(config: &PoolConfig, snapshot: &Snapshot) -> Self {
        let pool = config.pool;
        let fmt = |amount| format_amount(amount, config.decimals);
        let position = snapshot.position(pool);
        let balance = snapshot.wallet_balance(pool);
        let info = snapshot.pool_info(pool);

        let presets = AMOUNT_PRESETS
            .iter()
            .map(|(label, percent)| PresetDto {
                label: label.to_string(),
                amount: fmt(preset_amount(balance, *percent, config.is_native)),
            })
            .collect();

        Self {
            pool,
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            decimals: config.decimals,
            is_native: config.is_native,
            asset_address: config.asset_address.to_string(),
            staked: fmt(position.staked),
            pending_reward: fmt(position.pending_reward),
            withdraw_requested: fmt(position.withdraw_requested),
            withdraw_ready: fmt(position.withdraw_ready),
            withdraw_pending: fmt(position.withdraw_pending),
            wallet_balance: fmt(balance),
            total_staked: info.map(|i| fmt(i.total_staked)),
            min_deposit: info.map(|i| fmt(i.min_deposit)),
            pool_weight: info.map(|i| i.pool_weight.to_string()),
            unstake_lock_blocks: info.map(|i| i.unstake_lock_blocks),
            presets,
        }
    }
}

/// Fungible asset details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDto {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: String,
    pub balance: String,
    pub allowance: String,
}

impl From<&AssetInfo> for AssetDto {
    fn from(asset: &AssetInfo) -> Self {
        let fmt = |amount| format_amount(amount, asset.decimals);
        Self {
            name: asset.name.clone(),
            symbol: asset.symbol.clone(),
            decimals: asset.decimals,
            total_supply: fmt(asset.total_supply),
            balance: fmt(asset.balance),
            allowance: fmt(asset.allowance),
        }
    }
}

/// Contract-wide ledger status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStatusDto {
    pub paused: bool,
    pub claim_paused: bool,
    pub withdraw_paused: bool,
    pub total_pool_weight: String,
    pub reward_per_block: String,
    pub reward_token: String,
}

impl From<&LedgerStatus> for LedgerStatusDto {
    fn from(status: &LedgerStatus) -> Self {
        Self {
            paused: status.paused,
            claim_paused: status.claim_paused,
            withdraw_paused: status.withdraw_paused,
            total_pool_weight: status.total_pool_weight.to_string(),
            // rewards are paid in the staked asset
            reward_per_block: format_amount(status.reward_per_block, ASSET_POOL_DECIMALS),
            reward_token: status.reward_token.to_string(),
        }
    }
}

/// Full snapshot response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub version: u64,
    /// False while no wallet is connected
    pub ready: bool,
    pub loaded: bool,
    /// True while a refresh is in flight
    pub loading: bool,
    /// Set when the latest refresh failed; values are from the last good one
    pub error: Option<ApiError>,
    pub user: Option<String>,
    pub pools: Vec<PoolDto>,
    pub asset: Option<AssetDto>,
    pub ledger: Option<LedgerStatusDto>,
}

impl SnapshotResponse {
    pub fn new(
        snapshot: &Snapshot,
        pools: [&PoolConfig; 2],
        ready: bool,
        loading: bool,
    ) -> Self {
        Self {
            version: snapshot.version,
            ready,
            loaded: snapshot.is_loaded(),
            loading,
            error: snapshot.error.as_ref().map(ApiError::from),
            user: snapshot.user().map(|u| u.to_string()),
            pools: pools
                .into_iter()
                .map(|config| PoolDto::from_snapshot(config, snapshot))
                .collect(),
            asset: snapshot.asset().map(AssetDto::from),
            ledger: snapshot.ledger_status().map(LedgerStatusDto::from),
        }
    }
}

// =============================================================================
// Summary DTOs
// =============================================================================

/// Derived statistics for one pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatsDto {
    pub pool: PoolId,
    pub staked: String,
    pub pending_reward: String,
    pub withdraw_pending: String,
    pub withdraw_ready: String,
}

impl PoolStatsDto {
    fn new(stats: &PoolStats, decimals: u8) -> Self {
        Self {
            pool: stats.pool,
            staked: format_amount(stats.staked, decimals),
            pending_reward: format_amount(stats.pending_reward, decimals),
            withdraw_pending: format_amount(stats.withdraw_pending, decimals),
            withdraw_ready: format_amount(stats.withdraw_ready, decimals),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsDto {
    pub staked: String,
    pub pending_reward: String,
    pub withdraw_pending: String,
    pub withdraw_ready: String,
}

impl TotalsDto {
    fn new(totals: &Totals, decimals: u8) -> Self {
        Self {
            staked: format_amount(totals.staked, decimals),
            pending_reward: format_amount(totals.pending_reward, decimals),
            withdraw_pending: format_amount(totals.withdraw_pending, decimals),
            withdraw_ready: format_amount(totals.withdraw_ready, decimals),
        }
    }
}

/// Cross-pool summary response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub version: u64,
    pub native: PoolStatsDto,
    pub asset: PoolStatsDto,
    /// Cross-pool sums; absent when the pools' assets use different decimals
    pub totals: Option<TotalsDto>,
}

impl SummaryResponse {
    pub fn new(version: u64, summary: &StatsSummary, native: &PoolConfig, asset: &PoolConfig) -> Self {
        Self {
            version,
            native: PoolStatsDto::new(&summary.native, native.decimals),
            asset: PoolStatsDto::new(&summary.asset, asset.decimals),
            totals: (native.decimals == asset.decimals)
                .then(|| TotalsDto::new(&summary.totals, native.decimals)),
        }
    }
}

// =============================================================================
// Operation DTOs
// =============================================================================

/// Stake or unstake request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRequest {
    pub pool: String,
    /// Decimal amount in the pool asset's units
    pub amount: String,
}

/// Withdraw or claim request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRequest {
    pub pool: String,
}

/// Asset approval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub amount: String,
}

/// Query for GET /staking/approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalQuery {
    pub pool: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub pool: PoolId,
    pub amount: String,
    pub needs_approval: bool,
}

/// Accepted operation outcome. Failures are returned as `ApiError` with an error status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    /// "success" or "needs_approval"
    pub status: String,
    pub tx_hash: Option<String>,
    /// Amount to approve before staking, when `status` is "needs_approval"
    pub required: Option<String>,
    pub allowance: Option<String>,
}

impl OperationResponse {
    /// Split an engine result into a response body or an error with status
    pub fn from_result(
        result: OperationResult,
        decimals: u8,
    ) -> Result<Self, (StatusCode, ApiError)> {
        match result {
            OperationResult::Success { tx_hash } => Ok(Self {
                status: "success".to_string(),
                tx_hash: Some(tx_hash.to_string()),
                required: None,
                allowance: None,
            }),
            OperationResult::NeedsApproval {
                required,
                allowance,
            } => Ok(Self {
                status: "needs_approval".to_string(),
                tx_hash: None,
                required: Some(format_amount(required, decimals)),
                allowance: Some(format_amount(allowance, decimals)),
            }),
            OperationResult::Failure(failure) => {
                Err((failure_status(&failure), ApiError::from(&failure)))
            }
        }
    }
}
