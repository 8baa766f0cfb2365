//! ledger-gateway: Typed access to the external staking ledger and asset contracts
//!
//! The engine never talks to a transport directly. It consumes two capabilities:
//! [`LedgerGateway`] for the staking ledger and [`AssetGateway`] for the fungible
//! asset staked in the asset pool. Every write is dry-run simulated first; a
//! reverted simulation is returned as [`GatewayError::Simulation`] and nothing
//! is submitted.
//!
//! [`MemoryLedger`] implements both traits in-process for tests and devnets.

pub mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};
use staking_core::{Address, Amount, BlockNumber, GatewayError, PoolId, TxHash};

pub use memory::{MemoryLedger, PoolParams, Submission};

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Ledger-reported facts about a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    /// Staked asset contract (zero address for the native asset)
    pub asset_address: Address,
    pub pool_weight: u128,
    pub last_reward_block: BlockNumber,
    pub acc_reward_per_share: u128,
    pub total_staked: Amount,
    pub min_deposit: Amount,
    /// Blocks between an unstake request and the funds becoming withdrawable
    pub unstake_lock_blocks: BlockNumber,
}

/// Withdraw bookkeeping for one user in one pool, as the ledger reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WithdrawAmounts {
    /// Cumulative amount ever requested for unstake
    pub requested: Amount,
    /// Portion of `requested` whose lock has elapsed and is withdrawable now
    pub ready: Amount,
}

/// Contract-wide ledger status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub paused: bool,
    pub claim_paused: bool,
    pub withdraw_paused: bool,
    pub total_pool_weight: u128,
    pub reward_per_block: Amount,
    /// Token paid out on claim
    pub reward_token: Address,
}

/// Fungible asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Amount,
}

/// Staking ledger capability.
///
/// Reads return ledger-confirmed state. Writes simulate first and return the
/// transaction hash once the ledger accepts the submission.
pub trait LedgerGateway: Send + Sync + 'static {
    /// Ledger contract address; the spender for asset approvals
    fn ledger_address(&self) -> &Address;

    fn read_status(&self) -> impl Future<Output = Result<LedgerStatus>> + Send;

    fn read_pool(&self, pool: PoolId) -> impl Future<Output = Result<PoolInfo>> + Send;

    fn read_staked(
        &self,
        pool: PoolId,
        user: &Address,
    ) -> impl Future<Output = Result<Amount>> + Send;

    fn read_pending_reward(
        &self,
        pool: PoolId,
        user: &Address,
    ) -> impl Future<Output = Result<Amount>> + Send;

    fn read_withdraw_amounts(
        &self,
        pool: PoolId,
        user: &Address,
    ) -> impl Future<Output = Result<WithdrawAmounts>> + Send;

    /// Native coin balance of an account
    fn read_native_balance(&self, user: &Address) -> impl Future<Output = Result<Amount>> + Send;

    /// Value-carrying deposit into the native pool
    fn deposit_native(
        &self,
        amount: Amount,
        user: &Address,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Transfer-based deposit; requires a prior asset approval
    fn deposit_asset(
        &self,
        pool: PoolId,
        amount: Amount,
        user: &Address,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    fn request_unstake(
        &self,
        pool: PoolId,
        amount: Amount,
        user: &Address,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Withdraw every request whose lock has elapsed
    fn withdraw(&self, pool: PoolId, user: &Address) -> impl Future<Output = Result<TxHash>> + Send;

    fn claim(&self, pool: PoolId, user: &Address) -> impl Future<Output = Result<TxHash>> + Send;
}

/// Fungible asset capability
pub trait AssetGateway: Send + Sync + 'static {
    fn asset_address(&self) -> &Address;

    fn read_meta(&self) -> impl Future<Output = Result<AssetMeta>> + Send;

    fn read_balance(&self, user: &Address) -> impl Future<Output = Result<Amount>> + Send;

    fn read_allowance(
        &self,
        owner: &Address,
        spender: &Address,
    ) -> impl Future<Output = Result<Amount>> + Send;

    /// Set the allowance of `spender` over `user`'s balance to exactly `amount`
    fn approve(
        &self,
        spender: &Address,
        amount: Amount,
        user: &Address,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    fn transfer(
        &self,
        to: &Address,
        amount: Amount,
        user: &Address,
    ) -> impl Future<Output = Result<TxHash>> + Send;
}
