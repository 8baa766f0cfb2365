//! In-process ledger
//!
//! `MemoryLedger` keeps staking ledger and asset contract state in memory and
//! implements both gateway traits against it. Writes follow the same
//! simulate-then-submit path a real transport uses, so reverts surface as
//! [`GatewayError::Simulation`] without touching state.
//!
//! Blocks only advance on writes, [`MemoryLedger::advance_blocks`] and
//! [`MemoryLedger::mine_block`]; only the last accrues reward. Tests usually
//! credit reward directly with [`MemoryLedger::credit_reward`]. Faults can be
//! injected per read method and for the next submission.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use staking_core::{Address, Amount, BlockNumber, GatewayError, PoolId, TxHash};

use crate::{
    AssetGateway, AssetMeta, LedgerGateway, LedgerStatus, PoolInfo, Result, WithdrawAmounts,
};

/// Read method names, used in errors and for fault injection
pub mod methods {
    pub const STATUS: &str = "status";
    pub const POOL: &str = "pool";
    pub const STAKING_BALANCE: &str = "stakingBalance";
    pub const PENDING_REWARD: &str = "pendingReward";
    pub const WITHDRAW_AMOUNT: &str = "withdrawAmount";
    pub const NATIVE_BALANCE: &str = "getBalance";
    pub const ASSET_META: &str = "tokenInfo";
    pub const BALANCE_OF: &str = "balanceOf";
    pub const ALLOWANCE: &str = "allowance";
}

/// Fixed-point scale of `acc_reward_per_share`
const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Ledger-side pool parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    pub weight: u128,
    pub min_deposit: Amount,
    pub unstake_lock_blocks: BlockNumber,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            weight: 100,
            min_deposit: 0,
            unstake_lock_blocks: 20,
        }
    }
}

/// A write accepted by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub method: &'static str,
    pub user: Address,
    pub pool: Option<PoolId>,
    pub amount: Option<Amount>,
    pub tx_hash: TxHash,
    pub block: BlockNumber,
}

#[derive(Debug, Clone, Copy)]
struct UnstakeRequest {
    amount: Amount,
    unlock_block: BlockNumber,
}

#[derive(Debug, Default)]
struct Position {
    staked: Amount,
    pending_reward: Amount,
    requests: Vec<UnstakeRequest>,
    requested_total: Amount,
}

impl Position {
    fn ready(&self, block: BlockNumber) -> Amount {
        self.requests
            .iter()
            .filter(|r| r.unlock_block <= block)
            .map(|r| r.amount)
            .sum()
    }
}

#[derive(Debug)]
struct PoolLedger {
    asset_address: Address,
    params: PoolParams,
    last_reward_block: BlockNumber,
    acc_reward_per_share: u128,
    total_staked: Amount,
    positions: HashMap<Address, Position>,
}

impl PoolLedger {
    fn new(asset_address: Address) -> Self {
        Self {
            asset_address,
            params: PoolParams::default(),
            last_reward_block: 0,
            acc_reward_per_share: 0,
            total_staked: 0,
            positions: HashMap::new(),
        }
    }

    fn position(&self, user: &Address) -> Option<&Position> {
        self.positions.get(user)
    }

    fn position_mut(&mut self, user: &Address) -> &mut Position {
        self.positions.entry(user.clone()).or_default()
    }
}

#[derive(Debug, Clone)]
struct ReadFault {
    method: &'static str,
    pool: Option<PoolId>,
}

#[derive(Debug)]
struct Chain {
    block: BlockNumber,
    tx_count: u64,
    status: LedgerStatus,
    pools: [PoolLedger; 2],
    native_balances: HashMap<Address, Amount>,
    asset_meta: AssetMeta,
    asset_balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    reward_balances: HashMap<Address, Amount>,
    submissions: Vec<Submission>,
    read_faults: Vec<ReadFault>,
    ready_skew: HashMap<PoolId, Amount>,
    rejection: Option<String>,
    unreachable: bool,
}

impl Chain {
    fn pool(&self, pool: PoolId) -> &PoolLedger {
        &self.pools[pool.index() as usize]
    }

    fn pool_mut(&mut self, pool: PoolId) -> &mut PoolLedger {
        &mut self.pools[pool.index() as usize]
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn check_read(&self, method: &'static str, pool: Option<PoolId>) -> Result<()> {
        if self.unreachable {
            return Err(GatewayError::Unreachable {
                reason: "in-memory ledger marked unreachable".to_string(),
            });
        }
        let faulted = self
            .read_faults
            .iter()
            .any(|f| f.method == method && (f.pool.is_none() || f.pool == pool));
        if faulted {
            return Err(GatewayError::Read {
                method,
                message: "injected read fault".to_string(),
            });
        }
        Ok(())
    }

    /// Credit a withdrawn or transferred amount back to the user's wallet
    fn credit_wallet(&mut self, pool: PoolId, user: &Address, amount: Amount) {
        let balances = if pool.is_native() {
            &mut self.native_balances
        } else {
            &mut self.asset_balances
        };
        *balances.entry(user.clone()).or_insert(0) += amount;
    }
}

/// In-process staking ledger and fungible asset contract
#[derive(Debug)]
pub struct MemoryLedger {
    ledger_address: Address,
    asset_address: Address,
    chain: Mutex<Chain>,
}

impl MemoryLedger {
    /// Create an empty ledger with both pools at default parameters
    pub fn new(ledger_address: Address, asset_address: Address, asset_meta: AssetMeta) -> Self {
        let status = LedgerStatus {
            paused: false,
            claim_paused: false,
            withdraw_paused: false,
            total_pool_weight: PoolParams::default().weight * PoolId::ALL.len() as u128,
            reward_per_block: 0,
            reward_token: asset_address.clone(),
        };

        let chain = Chain {
            block: 1,
            tx_count: 0,
            status,
            pools: [
                PoolLedger::new(Address::zero()),
                PoolLedger::new(asset_address.clone()),
            ],
            native_balances: HashMap::new(),
            asset_meta,
            asset_balances: HashMap::new(),
            allowances: HashMap::new(),
            reward_balances: HashMap::new(),
            submissions: Vec::new(),
            read_faults: Vec::new(),
            ready_skew: HashMap::new(),
            rejection: None,
            unreachable: false,
        };

        Self {
            ledger_address,
            asset_address,
            chain: Mutex::new(chain),
        }
    }

    fn chain(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Setup and inspection
    // =========================================================================

    /// Replace a pool's parameters
    pub fn configure_pool(&self, pool: PoolId, params: PoolParams) {
        let mut chain = self.chain();
        chain.pool_mut(pool).params = params;
        chain.status.total_pool_weight = chain.pools.iter().map(|p| p.params.weight).sum();
    }

    pub fn fund_native(&self, user: &Address, amount: Amount) {
        *self
            .chain()
            .native_balances
            .entry(user.clone())
            .or_insert(0) += amount;
    }

    /// Mint fungible asset to an account
    pub fn fund_asset(&self, user: &Address, amount: Amount) {
        let mut chain = self.chain();
        chain.asset_meta.total_supply += amount;
        *chain.asset_balances.entry(user.clone()).or_insert(0) += amount;
    }

    /// Add reward to a position directly
    pub fn credit_reward(&self, pool: PoolId, user: &Address, amount: Amount) {
        self.chain().pool_mut(pool).position_mut(user).pending_reward += amount;
    }

    pub fn advance_blocks(&self, blocks: BlockNumber) {
        self.chain().block += blocks;
    }

    /// Mine one empty block and accrue its reward.
    ///
    /// Each pool gets `reward_per_block * weight / total_weight`, shared
    /// between its positions pro rata to stake.
    pub fn mine_block(&self) {
        let mut chain = self.chain();
        chain.block += 1;
        let block = chain.block;
        let reward_per_block = chain.status.reward_per_block;
        let total_weight = chain.status.total_pool_weight;

        for ledger in chain.pools.iter_mut() {
            ledger.last_reward_block = block;
            if ledger.total_staked == 0 || total_weight == 0 {
                continue;
            }
            let pool_reward = mul_div(reward_per_block, ledger.params.weight, total_weight);
            let total_staked = ledger.total_staked;
            ledger.acc_reward_per_share = ledger
                .acc_reward_per_share
                .saturating_add(mul_div(pool_reward, REWARD_PRECISION, total_staked));
            for position in ledger.positions.values_mut() {
                let share = mul_div(pool_reward, position.staked, total_staked);
                position.pending_reward = position.pending_reward.saturating_add(share);
            }
        }
    }

    pub fn current_block(&self) -> BlockNumber {
        self.chain().block
    }

    pub fn set_reward_per_block(&self, amount: Amount) {
        self.chain().status.reward_per_block = amount;
    }

    pub fn set_paused(&self, paused: bool) {
        self.chain().status.paused = paused;
    }

    pub fn set_withdraw_paused(&self, paused: bool) {
        self.chain().status.withdraw_paused = paused;
    }

    pub fn set_claim_paused(&self, paused: bool) {
        self.chain().status.claim_paused = paused;
    }

    /// Make every read of `method` fail until faults are cleared
    pub fn fail_read(&self, method: &'static str) {
        self.chain().read_faults.push(ReadFault { method, pool: None });
    }

    /// Make reads of `method` for one pool fail until faults are cleared
    pub fn fail_read_in(&self, pool: PoolId, method: &'static str) {
        self.chain().read_faults.push(ReadFault {
            method,
            pool: Some(pool),
        });
    }

    /// Report `extra` more as withdrawable in `pool` than the ledger holds,
    /// so reads show ready above requested until faults are cleared
    pub fn skew_withdraw_ready(&self, pool: PoolId, extra: Amount) {
        self.chain().ready_skew.insert(pool, extra);
    }

    pub fn clear_faults(&self) {
        let mut chain = self.chain();
        chain.read_faults.clear();
        chain.ready_skew.clear();
        chain.rejection = None;
        chain.unreachable = false;
    }

    /// Reject the next submission after its simulation passes (e.g. user decline)
    pub fn reject_next_submission(&self, message: impl Into<String>) {
        self.chain().rejection = Some(message.into());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.chain().unreachable = unreachable;
    }

    /// Every write the ledger accepted, oldest first
    pub fn submissions(&self) -> Vec<Submission> {
        self.chain().submissions.clone()
    }

    pub fn native_balance_of(&self, user: &Address) -> Amount {
        self.chain().native_balances.get(user).copied().unwrap_or(0)
    }

    pub fn asset_balance_of(&self, user: &Address) -> Amount {
        self.chain().asset_balances.get(user).copied().unwrap_or(0)
    }

    pub fn reward_balance_of(&self, user: &Address) -> Amount {
        self.chain().reward_balances.get(user).copied().unwrap_or(0)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Run a read against the chain after yielding once, so concurrent reads interleave
    async fn read<T>(
        &self,
        method: &'static str,
        pool: Option<PoolId>,
        read: impl FnOnce(&Chain) -> T,
    ) -> Result<T> {
        tokio::task::yield_now().await;
        let chain = self.chain();
        chain.check_read(method, pool)?;
        Ok(read(&chain))
    }

    /// Dry-run `simulate`; on success mine one block and `apply` the write in it
    async fn submit(
        &self,
        method: &'static str,
        user: &Address,
        pool: Option<PoolId>,
        amount: Option<Amount>,
        simulate: impl FnOnce(&Chain) -> std::result::Result<(), String>,
        apply: impl FnOnce(&mut Chain),
    ) -> Result<TxHash> {
        tokio::task::yield_now().await;
        let mut chain = self.chain();

        if chain.unreachable {
            return Err(GatewayError::Unreachable {
                reason: "in-memory ledger marked unreachable".to_string(),
            });
        }

        simulate(&chain).map_err(|message| GatewayError::Simulation { method, message })?;

        if let Some(message) = chain.rejection.take() {
            return Err(GatewayError::Rejected { message });
        }

        chain.block += 1;
        chain.tx_count += 1;
        apply(&mut chain);

        let mut hash = [0u8; 32];
        hash[..8].copy_from_slice(&chain.block.to_be_bytes());
        hash[24..].copy_from_slice(&chain.tx_count.to_be_bytes());
        let tx_hash = TxHash::from_bytes(hash);

        let block = chain.block;
        chain.submissions.push(Submission {
            method,
            user: user.clone(),
            pool,
            amount,
            tx_hash: tx_hash.clone(),
            block,
        });

        tracing::debug!(method, user = %user, tx_hash = %tx_hash, block, "memory ledger accepted write");
        Ok(tx_hash)
    }
}

/// `a * b / d` without overflowing the intermediate product.
///
/// Exact whenever `a * b` fits in `u128`. Otherwise the remainder term drops
/// just enough low bits to fit, and the whole term saturates.
fn mul_div(a: u128, b: u128, d: u128) -> u128 {
    if d == 0 {
        return 0;
    }
    if let Some(product) = a.checked_mul(b) {
        return product / d;
    }

    let whole = (a / d).saturating_mul(b);
    let rem = a % d;
    let bits = |x: u128| 128 - x.leading_zeros();
    let shift = (bits(rem) + bits(b)).saturating_sub(128);
    let fraction = ((rem >> shift) * b)
        .checked_div(d >> shift)
        .unwrap_or(0);
    whole.saturating_add(fraction)
}

fn require(condition: bool, message: &str) -> std::result::Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

/// Shared deposit bookkeeping for both pools
fn credit_stake(chain: &mut Chain, pool: PoolId, user: &Address, amount: Amount) {
    let block = chain.block;
    let ledger = chain.pool_mut(pool);
    ledger.total_staked += amount;
    ledger.last_reward_block = block;
    ledger.position_mut(user).staked += amount;
}

impl LedgerGateway for MemoryLedger {
    fn ledger_address(&self) -> &Address {
        &self.ledger_address
    }

    async fn read_status(&self) -> Result<LedgerStatus> {
        self.read(methods::STATUS, None, |chain| chain.status.clone())
            .await
    }

    async fn read_pool(&self, pool: PoolId) -> Result<PoolInfo> {
        self.read(methods::POOL, Some(pool), |chain| {
            let ledger = chain.pool(pool);
            PoolInfo {
                asset_address: ledger.asset_address.clone(),
                pool_weight: ledger.params.weight,
                last_reward_block: ledger.last_reward_block,
                acc_reward_per_share: ledger.acc_reward_per_share,
                total_staked: ledger.total_staked,
                min_deposit: ledger.params.min_deposit,
                unstake_lock_blocks: ledger.params.unstake_lock_blocks,
            }
        })
        .await
    }

    async fn read_staked(&self, pool: PoolId, user: &Address) -> Result<Amount> {
        self.read(methods::STAKING_BALANCE, Some(pool), |chain| {
            chain.pool(pool).position(user).map_or(0, |p| p.staked)
        })
        .await
    }

    async fn read_pending_reward(&self, pool: PoolId, user: &Address) -> Result<Amount> {
        self.read(methods::PENDING_REWARD, Some(pool), |chain| {
            chain.pool(pool).position(user).map_or(0, |p| p.pending_reward)
        })
        .await
    }

    async fn read_withdraw_amounts(&self, pool: PoolId, user: &Address) -> Result<WithdrawAmounts> {
        self.read(methods::WITHDRAW_AMOUNT, Some(pool), |chain| {
            let mut amounts = chain
                .pool(pool)
                .position(user)
                .map(|p| WithdrawAmounts {
                    requested: p.requested_total,
                    ready: p.ready(chain.block),
                })
                .unwrap_or_default();
            if let Some(extra) = chain.ready_skew.get(&pool) {
                amounts.ready += extra;
            }
            amounts
        })
        .await
    }

    async fn read_native_balance(&self, user: &Address) -> Result<Amount> {
        self.read(methods::NATIVE_BALANCE, None, |chain| {
            chain.native_balances.get(user).copied().unwrap_or(0)
        })
        .await
    }

    async fn deposit_native(&self, amount: Amount, user: &Address) -> Result<TxHash> {
        let pool = PoolId::Native;
        self.submit(
            "depositETH",
            user,
            Some(pool),
            Some(amount),
            |chain| {
                require(!chain.status.paused, "Pausable: paused")?;
                require(amount > 0, "deposit amount is zero")?;
                require(
                    amount >= chain.pool(pool).params.min_deposit,
                    "deposit amount is too small",
                )?;
                let balance = chain.native_balances.get(user).copied().unwrap_or(0);
                require(balance >= amount, "insufficient funds for transfer")
            },
            |chain| {
                if let Some(balance) = chain.native_balances.get_mut(user) {
                    *balance -= amount;
                }
                credit_stake(chain, pool, user, amount);
            },
        )
        .await
    }

    async fn deposit_asset(&self, pool: PoolId, amount: Amount, user: &Address) -> Result<TxHash> {
        let spender = self.ledger_address.clone();
        self.submit(
            "deposit",
            user,
            Some(pool),
            Some(amount),
            |chain| {
                require(!pool.is_native(), "deposit not support ETH staking")?;
                require(!chain.status.paused, "Pausable: paused")?;
                require(amount > 0, "deposit amount is zero")?;
                require(
                    amount >= chain.pool(pool).params.min_deposit,
                    "deposit amount is too small",
                )?;
                require(
                    chain.allowance(user, &spender) >= amount,
                    "ERC20: insufficient allowance",
                )?;
                let balance = chain.asset_balances.get(user).copied().unwrap_or(0);
                require(balance >= amount, "ERC20: transfer amount exceeds balance")
            },
            |chain| {
                if let Some(allowance) = chain.allowances.get_mut(&(user.clone(), spender.clone())) {
                    *allowance -= amount;
                }
                if let Some(balance) = chain.asset_balances.get_mut(user) {
                    *balance -= amount;
                }
                *chain.asset_balances.entry(spender.clone()).or_insert(0) += amount;
                credit_stake(chain, pool, user, amount);
            },
        )
        .await
    }

    async fn request_unstake(&self, pool: PoolId, amount: Amount, user: &Address) -> Result<TxHash> {
        self.submit(
            "unstake",
            user,
            Some(pool),
            Some(amount),
            |chain| {
                require(!chain.status.withdraw_paused, "withdraw is paused")?;
                require(amount > 0, "unstake amount is zero")?;
                let staked = chain.pool(pool).position(user).map_or(0, |p| p.staked);
                require(amount <= staked, "Not enough staking token balance")
            },
            |chain| {
                let unlock_block = chain.block + chain.pool(pool).params.unstake_lock_blocks;
                let block = chain.block;
                let ledger = chain.pool_mut(pool);
                ledger.total_staked -= amount;
                ledger.last_reward_block = block;
                let position = ledger.position_mut(user);
                position.staked -= amount;
                position.requested_total += amount;
                position.requests.push(UnstakeRequest {
                    amount,
                    unlock_block,
                });
            },
        )
        .await
    }

    async fn withdraw(&self, pool: PoolId, user: &Address) -> Result<TxHash> {
        let ledger_address = self.ledger_address.clone();
        self.submit(
            "withdraw",
            user,
            Some(pool),
            None,
            |chain| {
                require(!chain.status.withdraw_paused, "withdraw is paused")?;
                let ready = chain
                    .pool(pool)
                    .position(user)
                    .map_or(0, |p| p.ready(chain.block));
                require(ready > 0, "no withdrawable amount")
            },
            |chain| {
                let block = chain.block;
                let position = chain.pool_mut(pool).position_mut(user);
                let ready = position.ready(block);
                position.requests.retain(|r| r.unlock_block > block);
                if !pool.is_native() {
                    if let Some(held) = chain.asset_balances.get_mut(&ledger_address) {
                        *held = held.saturating_sub(ready);
                    }
                }
                chain.credit_wallet(pool, user, ready);
            },
        )
        .await
    }

    async fn claim(&self, pool: PoolId, user: &Address) -> Result<TxHash> {
        self.submit(
            "claim",
            user,
            Some(pool),
            None,
            |chain| {
                require(!chain.status.claim_paused, "claim is paused")?;
                let pending = chain.pool(pool).position(user).map_or(0, |p| p.pending_reward);
                require(pending > 0, "no pending reward")
            },
            |chain| {
                let position = chain.pool_mut(pool).position_mut(user);
                let reward = std::mem::take(&mut position.pending_reward);
                *chain.reward_balances.entry(user.clone()).or_insert(0) += reward;
            },
        )
        .await
    }
}

impl AssetGateway for MemoryLedger {
    fn asset_address(&self) -> &Address {
        &self.asset_address
    }

    async fn read_meta(&self) -> Result<AssetMeta> {
        self.read(methods::ASSET_META, None, |chain| chain.asset_meta.clone())
            .await
    }

    async fn read_balance(&self, user: &Address) -> Result<Amount> {
        self.read(methods::BALANCE_OF, None, |chain| {
            chain.asset_balances.get(user).copied().unwrap_or(0)
        })
        .await
    }

    async fn read_allowance(&self, owner: &Address, spender: &Address) -> Result<Amount> {
        self.read(methods::ALLOWANCE, None, |chain| {
            chain.allowance(owner, spender)
        })
        .await
    }

    async fn approve(&self, spender: &Address, amount: Amount, user: &Address) -> Result<TxHash> {
        self.submit(
            "approve",
            user,
            None,
            Some(amount),
            |_| require(!spender.is_zero(), "ERC20: approve to the zero address"),
            |chain| {
                chain
                    .allowances
                    .insert((user.clone(), spender.clone()), amount);
            },
        )
        .await
    }

    async fn transfer(&self, to: &Address, amount: Amount, user: &Address) -> Result<TxHash> {
        self.submit(
            "transfer",
            user,
            None,
            Some(amount),
            |chain| {
                require(!to.is_zero(), "ERC20: transfer to the zero address")?;
                let balance = chain.asset_balances.get(user).copied().unwrap_or(0);
                require(balance >= amount, "ERC20: transfer amount exceeds balance")
            },
            |chain| {
                if let Some(balance) = chain.asset_balances.get_mut(user) {
                    *balance -= amount;
                }
                *chain.asset_balances.entry(to.clone()).or_insert(0) += amount;
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(
            addr(0x11),
            addr(0x22),
            AssetMeta {
                name: "MetaNode".to_string(),
                symbol: "MNT".to_string(),
                decimals: 18,
                total_supply: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_native_deposit_moves_balance_into_pool() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.fund_native(&user, 1_000);

        let hash = ledger.deposit_native(400, &user).await.unwrap();
        assert!(hash.as_str().starts_with("0x"));

        assert_eq!(ledger.read_staked(PoolId::Native, &user).await.unwrap(), 400);
        assert_eq!(ledger.native_balance_of(&user), 600);
        assert_eq!(ledger.read_pool(PoolId::Native).await.unwrap().total_staked, 400);
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_asset_deposit_requires_allowance() {
        let ledger = ledger();
        let user = addr(0xaa);
        let spender = ledger.ledger_address().clone();
        ledger.fund_asset(&user, 50);

        let err = ledger.deposit_asset(PoolId::Asset, 50, &user).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Simulation {
                method: "deposit",
                message: "ERC20: insufficient allowance".to_string(),
            }
        );
        assert!(ledger.submissions().is_empty());

        ledger.approve(&spender, 50, &user).await.unwrap();
        ledger.deposit_asset(PoolId::Asset, 50, &user).await.unwrap();
        assert_eq!(ledger.read_allowance(&user, &spender).await.unwrap(), 0);
        assert_eq!(ledger.read_staked(PoolId::Asset, &user).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_unstake_lock_and_withdraw() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.configure_pool(
            PoolId::Native,
            PoolParams {
                unstake_lock_blocks: 5,
                ..PoolParams::default()
            },
        );
        ledger.fund_native(&user, 100);
        ledger.deposit_native(100, &user).await.unwrap();
        ledger.request_unstake(PoolId::Native, 30, &user).await.unwrap();

        let amounts = ledger.read_withdraw_amounts(PoolId::Native, &user).await.unwrap();
        assert_eq!(amounts, WithdrawAmounts { requested: 30, ready: 0 });
        assert!(ledger.withdraw(PoolId::Native, &user).await.is_err());

        ledger.advance_blocks(5);
        let amounts = ledger.read_withdraw_amounts(PoolId::Native, &user).await.unwrap();
        assert_eq!(amounts.ready, 30);

        ledger.withdraw(PoolId::Native, &user).await.unwrap();
        let amounts = ledger.read_withdraw_amounts(PoolId::Native, &user).await.unwrap();
        assert_eq!(amounts, WithdrawAmounts { requested: 30, ready: 0 });
        assert_eq!(ledger.native_balance_of(&user), 30);
    }

    #[tokio::test]
    async fn test_unstake_more_than_staked_reverts() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.fund_native(&user, 10);
        ledger.deposit_native(10, &user).await.unwrap();

        let err = ledger
            .request_unstake(PoolId::Native, 15, &user)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Simulation { method: "unstake", .. }));
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_moves_reward() {
        let ledger = ledger();
        let user = addr(0xaa);
        assert!(ledger.claim(PoolId::Asset, &user).await.is_err());

        ledger.credit_reward(PoolId::Asset, &user, 7);
        ledger.claim(PoolId::Asset, &user).await.unwrap();
        assert_eq!(ledger.read_pending_reward(PoolId::Asset, &user).await.unwrap(), 0);
        assert_eq!(ledger.reward_balance_of(&user), 7);
    }

    #[tokio::test]
    async fn test_mined_blocks_accrue_reward_by_weight_and_stake() {
        let ledger = ledger();
        let (a, b) = (addr(0xaa), addr(0xbb));
        ledger.fund_native(&a, 300);
        ledger.fund_native(&b, 100);
        ledger.deposit_native(300, &a).await.unwrap();
        ledger.deposit_native(100, &b).await.unwrap();
        ledger.set_reward_per_block(1_000);

        let before = ledger.current_block();
        ledger.mine_block();
        assert_eq!(ledger.current_block(), before + 1);

        // native pool holds half the weight: 500 split 3:1
        assert_eq!(ledger.read_pending_reward(PoolId::Native, &a).await.unwrap(), 375);
        assert_eq!(ledger.read_pending_reward(PoolId::Native, &b).await.unwrap(), 125);
        // asset pool has no stake and accrues nothing
        assert_eq!(ledger.read_pool(PoolId::Asset).await.unwrap().acc_reward_per_share, 0);
    }

    #[tokio::test]
    async fn test_large_stakes_accrue_without_overflow() {
        const ETH: u128 = 1_000_000_000_000_000_000;
        let ledger = ledger();
        let (a, b) = (addr(0xaa), addr(0xbb));
        ledger.fund_native(&a, 7_500 * ETH);
        ledger.fund_native(&b, 2_500 * ETH);
        ledger.deposit_native(7_500 * ETH, &a).await.unwrap();
        ledger.deposit_native(2_500 * ETH, &b).await.unwrap();
        ledger.set_reward_per_block(ETH / 10);

        ledger.mine_block();

        // half of 0.1 per block goes to the native pool, split 3:1
        assert_eq!(
            ledger.read_pending_reward(PoolId::Native, &a).await.unwrap(),
            ETH * 375 / 10_000
        );
        assert_eq!(
            ledger.read_pending_reward(PoolId::Native, &b).await.unwrap(),
            ETH * 125 / 10_000
        );
        assert_eq!(
            ledger.read_pool(PoolId::Native).await.unwrap().acc_reward_per_share,
            5 * 10u128.pow(12)
        );
    }

    #[test]
    fn test_mul_div_matches_exact_result() {
        assert_eq!(mul_div(10, 3, 4), 7);
        assert_eq!(mul_div(5 * 10u128.pow(16), 10u128.pow(22), 10u128.pow(22)), 5 * 10u128.pow(16));
        assert_eq!(mul_div(u128::MAX, 2, 4), u128::MAX / 2);
        assert_eq!(mul_div(7, 7, 0), 0);
    }

    #[tokio::test]
    async fn test_transfer_moves_asset() {
        let ledger = ledger();
        let (a, b) = (addr(0xaa), addr(0xbb));
        ledger.fund_asset(&a, 100);

        ledger.transfer(&b, 40, &a).await.unwrap();
        assert_eq!(ledger.asset_balance_of(&a), 60);
        assert_eq!(ledger.read_balance(&b).await.unwrap(), 40);

        let err = ledger.transfer(&b, 61, &a).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Simulation {
                method: "transfer",
                message: "ERC20: transfer amount exceeds balance".to_string(),
            }
        );
        assert!(ledger.transfer(&Address::zero(), 1, &a).await.is_err());
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_paused_ledger_reverts_writes() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.fund_native(&user, 100);
        ledger.deposit_native(50, &user).await.unwrap();
        ledger.credit_reward(PoolId::Native, &user, 3);

        ledger.set_paused(true);
        let err = ledger.deposit_native(10, &user).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Simulation {
                method: "depositETH",
                message: "Pausable: paused".to_string(),
            }
        );

        ledger.set_withdraw_paused(true);
        assert!(matches!(
            ledger.request_unstake(PoolId::Native, 10, &user).await,
            Err(GatewayError::Simulation { method: "unstake", .. })
        ));

        ledger.set_claim_paused(true);
        assert!(matches!(
            ledger.claim(PoolId::Native, &user).await,
            Err(GatewayError::Simulation { method: "claim", .. })
        ));

        let status = ledger.read_status().await.unwrap();
        assert!(status.paused && status.withdraw_paused && status.claim_paused);
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_ledger_fails_reads_and_writes() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.fund_native(&user, 10);
        ledger.set_unreachable(true);

        assert!(matches!(
            ledger.read_status().await,
            Err(GatewayError::Unreachable { .. })
        ));
        assert!(matches!(
            ledger.deposit_native(5, &user).await,
            Err(GatewayError::Unreachable { .. })
        ));

        ledger.set_unreachable(false);
        assert!(ledger.deposit_native(5, &user).await.is_ok());
    }

    #[tokio::test]
    async fn test_ready_skew_reports_more_than_requested() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.skew_withdraw_ready(PoolId::Asset, 4);

        let amounts = ledger.read_withdraw_amounts(PoolId::Asset, &user).await.unwrap();
        assert_eq!(amounts, WithdrawAmounts { requested: 0, ready: 4 });
        let native = ledger.read_withdraw_amounts(PoolId::Native, &user).await.unwrap();
        assert_eq!(native, WithdrawAmounts::default());

        ledger.clear_faults();
        let amounts = ledger.read_withdraw_amounts(PoolId::Asset, &user).await.unwrap();
        assert_eq!(amounts.ready, 0);
    }

    #[tokio::test]
    async fn test_read_faults_are_scoped() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.fail_read_in(PoolId::Asset, methods::PENDING_REWARD);

        assert!(ledger.read_pending_reward(PoolId::Native, &user).await.is_ok());
        let err = ledger
            .read_pending_reward(PoolId::Asset, &user)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Read { method: "pendingReward", .. }));

        ledger.clear_faults();
        assert!(ledger.read_pending_reward(PoolId::Asset, &user).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejection_happens_after_simulation() {
        let ledger = ledger();
        let user = addr(0xaa);
        ledger.fund_native(&user, 10);
        ledger.reject_next_submission("User rejected the request.");

        // A reverting simulation does not consume the pending rejection
        assert!(matches!(
            ledger.deposit_native(20, &user).await,
            Err(GatewayError::Simulation { .. })
        ));
        assert!(matches!(
            ledger.deposit_native(5, &user).await,
            Err(GatewayError::Rejected { .. })
        ));
        assert!(ledger.deposit_native(5, &user).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_reads_interleave() {
        let ledger = ledger();
        let user = addr(0xaa);
        let (a, b) = futures::join!(
            ledger.read_staked(PoolId::Native, &user),
            ledger.read_native_balance(&user)
        );
        assert_eq!(a.unwrap(), 0);
        assert_eq!(b.unwrap(), 0);
    }
}
