//! Lifecycle Orchestrator
//!
//! stake, unstake, withdraw and claim for one pool. Each call checks its
//! precondition against the latest snapshot, then submits to the ledger.
//! The ledger stays the final arbiter: a stale snapshot that lets a call
//! through shows up as a `Submission` failure, never a panic.
//!
//! Nothing here mutates the snapshot or retries. Callers refresh afterwards.

use std::future::Future;

use ledger_gateway::{AssetGateway, LedgerGateway};
use staking_core::{Address, Amount, GatewayError, PoolId, ProtocolError, TxHash};

use crate::approval::check_allowance;
use crate::state::{OperationFailure, OperationKind, OperationResult, Snapshot};

// =============================================================================
// Preconditions
// =============================================================================

/// The snapshot must be loaded and belong to the acting user
fn require_loaded(snapshot: &Snapshot, user: &Address) -> Result<(), ProtocolError> {
    match snapshot.user() {
        Some(owner) if owner == user => Ok(()),
        Some(owner) => Err(ProtocolError::NotReady {
            reason: format!("position snapshot belongs to {}, not {}", owner, user),
        }),
        None => Err(ProtocolError::NotReady {
            reason: "position snapshot not loaded".to_string(),
        }),
    }
}

fn require_positive(amount: Amount) -> Result<(), ProtocolError> {
    if amount == 0 {
        return Err(ProtocolError::InvalidAmount {
            message: "amount must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Stake is valid from any state while the wallet covers the amount
pub fn check_stake(
    snapshot: &Snapshot,
    user: &Address,
    pool: PoolId,
    amount: Amount,
) -> Result<(), ProtocolError> {
    require_loaded(snapshot, user)?;
    require_positive(amount)?;

    let available = snapshot.wallet_balance(pool);
    if amount > available {
        return Err(ProtocolError::InsufficientBalance {
            required: amount,
            available,
        });
    }
    Ok(())
}

/// Unstake needs staked principal covering the amount
pub fn check_unstake(
    snapshot: &Snapshot,
    user: &Address,
    pool: PoolId,
    amount: Amount,
) -> Result<(), ProtocolError> {
    require_loaded(snapshot, user)?;
    require_positive(amount)?;

    let staked = snapshot.staked(pool);
    if amount > staked {
        return Err(ProtocolError::ExceedsStake {
            requested: amount,
            staked,
        });
    }
    Ok(())
}

pub fn check_withdraw(snapshot: &Snapshot, user: &Address, pool: PoolId) -> Result<(), ProtocolError> {
    require_loaded(snapshot, user)?;
    if snapshot.withdraw_ready(pool) == 0 {
        return Err(ProtocolError::NothingToWithdraw { pool });
    }
    Ok(())
}

pub fn check_claim(snapshot: &Snapshot, user: &Address, pool: PoolId) -> Result<(), ProtocolError> {
    require_loaded(snapshot, user)?;
    if snapshot.pending_reward(pool) == 0 {
        return Err(ProtocolError::NothingToClaim { pool });
    }
    Ok(())
}

fn rejected(op: OperationKind, pool: PoolId, error: ProtocolError) -> OperationResult {
    tracing::warn!(op = op.as_str(), pool = %pool, error = %error, "rejected locally");
    OperationResult::Failure(OperationFailure::precondition(&error))
}

// =============================================================================
// Operations
// =============================================================================

/// Deposit `amount` into `pool`.
///
/// The asset pool re-reads the allowance first and returns `NeedsApproval`
/// without submitting when it does not cover `amount`.
pub async fn stake<L, A>(
    ledger: &L,
    asset: &A,
    snapshot: &Snapshot,
    user: &Address,
    pool: PoolId,
    amount: Amount,
) -> OperationResult
where
    L: LedgerGateway,
    A: AssetGateway,
{
    let op = OperationKind::Stake;
    if let Err(e) = check_stake(snapshot, user, pool, amount) {
        return rejected(op, pool, e);
    }

    if pool.is_native() {
        return submit(op, pool, user, ledger.deposit_native(amount, user)).await;
    }

    let check = match check_allowance(asset, ledger.ledger_address(), user, amount).await {
        Ok(check) => check,
        Err(e) => {
            tracing::warn!(pool = %pool, user = %user, error = %e, "allowance read failed");
            return OperationResult::Failure(OperationFailure::read(&e));
        }
    };
    if !check.is_sufficient() {
        tracing::info!(
            pool = %pool,
            user = %user,
            required = check.required,
            allowance = check.allowance,
            "stake needs approval"
        );
        return OperationResult::NeedsApproval {
            required: check.required,
            allowance: check.allowance,
        };
    }

    submit(op, pool, user, ledger.deposit_asset(pool, amount, user)).await
}

/// Request unstake of `amount`; funds become withdrawable once the ledger's lock elapses
pub async fn unstake<L: LedgerGateway>(
    ledger: &L,
    snapshot: &Snapshot,
    user: &Address,
    pool: PoolId,
    amount: Amount,
) -> OperationResult {
    let op = OperationKind::Unstake;
    if let Err(e) = check_unstake(snapshot, user, pool, amount) {
        return rejected(op, pool, e);
    }
    submit(op, pool, user, ledger.request_unstake(pool, amount, user)).await
}

pub async fn withdraw<L: LedgerGateway>(
    ledger: &L,
    snapshot: &Snapshot,
    user: &Address,
    pool: PoolId,
) -> OperationResult {
    let op = OperationKind::Withdraw;
    if let Err(e) = check_withdraw(snapshot, user, pool) {
        return rejected(op, pool, e);
    }
    submit(op, pool, user, ledger.withdraw(pool, user)).await
}

pub async fn claim<L: LedgerGateway>(
    ledger: &L,
    snapshot: &Snapshot,
    user: &Address,
    pool: PoolId,
) -> OperationResult {
    let op = OperationKind::Claim;
    if let Err(e) = check_claim(snapshot, user, pool) {
        return rejected(op, pool, e);
    }
    submit(op, pool, user, ledger.claim(pool, user)).await
}

async fn submit(
    op: OperationKind,
    pool: PoolId,
    user: &Address,
    write: impl Future<Output = Result<TxHash, GatewayError>>,
) -> OperationResult {
    match write.await {
        Ok(tx_hash) => {
            tracing::info!(op = op.as_str(), pool = %pool, user = %user, tx_hash = %tx_hash, "operation submitted");
            OperationResult::Success { tx_hash }
        }
        Err(e) => {
            tracing::warn!(op = op.as_str(), pool = %pool, user = %user, error = %e, "operation failed");
            OperationResult::Failure(OperationFailure::submission(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::pool_configs;
    use crate::fetch::fetch_position_state;
    use crate::state::FailureKind;
    use ledger_gateway::memory::methods;
    use ledger_gateway::{AssetMeta, MemoryLedger, PoolParams};
    use staking_core::StakingConfig;

    struct Fixture {
        ledger: MemoryLedger,
        config: StakingConfig,
        user: Address,
    }

    impl Fixture {
        fn new() -> Self {
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
            ledger.fund_asset(&user, 1_000);
            Self {
                ledger,
                config,
                user,
            }
        }

        async fn snapshot(&self) -> Snapshot {
            let state = fetch_position_state(
                &self.ledger,
                &self.ledger,
                &pool_configs(&self.config),
                &self.user,
            )
            .await
            .unwrap();
            Snapshot::loaded(1, state)
        }
    }

    #[test]
    fn test_checks_need_loaded_snapshot() {
        let empty = Snapshot::empty(0);
        let user = Address::from_bytes([0xaa; 20]);
        let err = check_stake(&empty, &user, PoolId::Native, 1).unwrap_err();
        assert_eq!(err.error_code(), "not_ready");
        assert!(check_claim(&empty, &user, PoolId::Asset).is_err());
    }

    #[tokio::test]
    async fn test_stake_native_submits_deposit() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Native, 400).await;
        assert!(result.is_success());

        let submissions = f.ledger.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].method, "depositETH");
        assert_eq!(submissions[0].amount, Some(400));
    }

    #[tokio::test]
    async fn test_stake_over_balance_rejected_locally() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Native, 1_001).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Precondition);
        assert_eq!(failure.code, "insufficient_balance");
        assert!(f.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_stake_zero_rejected_locally() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Asset, 0).await;
        assert_eq!(result.failure().unwrap().code, "invalid_amount");
        assert!(f.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_asset_stake_without_allowance_needs_approval() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Asset, 50).await;
        assert_eq!(
            result,
            OperationResult::NeedsApproval {
                required: 50,
                allowance: 0,
            }
        );
        assert!(f.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_asset_stake_uses_fresh_allowance() {
        let f = Fixture::new();
        // snapshot taken before approval still shows zero allowance
        let snapshot = f.snapshot().await;
        f.ledger
            .approve(&f.config.ledger_address, 50, &f.user)
            .await
            .unwrap();

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Asset, 50).await;
        assert!(result.is_success());
        assert_eq!(f.ledger.submissions().last().unwrap().method, "deposit");
    }

    #[tokio::test]
    async fn test_allowance_read_failure_is_read_failure() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;
        f.ledger.fail_read(methods::ALLOWANCE);

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Asset, 50).await;
        assert_eq!(result.failure().unwrap().kind, FailureKind::Read);
    }

    #[tokio::test]
    async fn test_unstake_over_staked_rejected_locally() {
        let f = Fixture::new();
        f.ledger.deposit_native(100, &f.user).await.unwrap();
        let snapshot = f.snapshot().await;
        let before = f.ledger.submissions().len();

        let result = unstake(&f.ledger, &snapshot, &f.user, PoolId::Native, 150).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.code, "exceeds_stake");
        assert_eq!(f.ledger.submissions().len(), before);
    }

    #[tokio::test]
    async fn test_stale_snapshot_surfaces_ledger_revert() {
        let f = Fixture::new();
        f.ledger.deposit_native(100, &f.user).await.unwrap();
        let snapshot = f.snapshot().await;
        // position shrinks behind the snapshot's back
        f.ledger
            .request_unstake(PoolId::Native, 80, &f.user)
            .await
            .unwrap();

        let result = unstake(&f.ledger, &snapshot, &f.user, PoolId::Native, 50).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Submission);
        assert_eq!(failure.code, "simulation_reverted");
    }

    #[tokio::test]
    async fn test_min_deposit_enforced_by_ledger() {
        let f = Fixture::new();
        f.ledger.configure_pool(
            PoolId::Native,
            PoolParams {
                min_deposit: 100,
                ..PoolParams::default()
            },
        );
        let snapshot = f.snapshot().await;

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Native, 10).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Submission);
        assert!(failure.message.contains("too small"));
    }

    #[tokio::test]
    async fn test_withdraw_and_claim_need_something_ready() {
        let f = Fixture::new();
        f.ledger.deposit_native(100, &f.user).await.unwrap();
        let snapshot = f.snapshot().await;

        let result = withdraw(&f.ledger, &snapshot, &f.user, PoolId::Native).await;
        assert_eq!(result.failure().unwrap().code, "nothing_to_withdraw");

        let result = claim(&f.ledger, &snapshot, &f.user, PoolId::Native).await;
        assert_eq!(result.failure().unwrap().code, "nothing_to_claim");
    }

    #[tokio::test]
    async fn test_claim_with_pending_reward() {
        let f = Fixture::new();
        f.ledger.deposit_native(100, &f.user).await.unwrap();
        f.ledger.credit_reward(PoolId::Native, &f.user, 12);
        let snapshot = f.snapshot().await;

        let result = claim(&f.ledger, &snapshot, &f.user, PoolId::Native).await;
        assert!(result.tx_hash().is_some());
        assert_eq!(f.ledger.reward_balance_of(&f.user), 12);
    }

    #[tokio::test]
    async fn test_user_decline_is_submission_failure() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;
        f.ledger.reject_next_submission("User denied transaction signature");

        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Native, 10).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Submission);
        assert_eq!(failure.code, "tx_rejected");
        assert!(f.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_of_other_user_rejected() {
        let f = Fixture::new();
        let snapshot = f.snapshot().await;
        let other = Address::from_bytes([0xbb; 20]);
        f.ledger.fund_native(&other, 1_000);

        let result = stake(&f.ledger, &f.ledger, &snapshot, &other, PoolId::Native, 10).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NotReady);
        assert!(failure.message.contains("belongs to"));

        let err = check_unstake(&snapshot, &other, PoolId::Native, 1).unwrap_err();
        assert_eq!(err.error_code(), "not_ready");
        assert!(f.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_paused_ledger_surfaces_submission_failures() {
        let f = Fixture::new();
        f.ledger.deposit_native(100, &f.user).await.unwrap();
        f.ledger.credit_reward(PoolId::Native, &f.user, 5);
        let snapshot = f.snapshot().await;

        f.ledger.set_paused(true);
        let result = stake(&f.ledger, &f.ledger, &snapshot, &f.user, PoolId::Native, 10).await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Submission);
        assert_eq!(failure.code, "simulation_reverted");
        assert!(failure.message.contains("Pausable: paused"));

        f.ledger.set_withdraw_paused(true);
        let result = unstake(&f.ledger, &snapshot, &f.user, PoolId::Native, 10).await;
        assert!(result.failure().unwrap().message.contains("withdraw is paused"));

        f.ledger.set_claim_paused(true);
        let result = claim(&f.ledger, &snapshot, &f.user, PoolId::Native).await;
        assert!(result.failure().unwrap().message.contains("claim is paused"));

        assert_eq!(f.ledger.submissions().len(), 1);
    }
}
