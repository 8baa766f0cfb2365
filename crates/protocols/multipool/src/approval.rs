//! Approval Coordinator
//!
//! Decides whether an asset deposit needs an approval first, and drives the
//! approval. Allowance is always read fresh from the asset gateway; the
//! snapshot copy may be stale.

use ledger_gateway::AssetGateway;
use staking_core::{Address, Amount, GatewayError, PoolId};

use crate::state::{OperationFailure, OperationResult};

/// Fresh allowance reading against a deposit amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceCheck {
    pub required: Amount,
    pub allowance: Amount,
}

impl AllowanceCheck {
    pub fn is_sufficient(&self) -> bool {
        self.allowance >= self.required
    }
}

/// Pure approval rule. The native pool has no allowance concept.
pub fn requires_approval(pool: PoolId, allowance: Amount, amount: Amount) -> bool {
    !pool.is_native() && allowance < amount
}

/// Read the current allowance of `spender` over `user`'s asset balance
pub async fn check_allowance<A: AssetGateway>(
    asset: &A,
    spender: &Address,
    user: &Address,
    amount: Amount,
) -> Result<AllowanceCheck, GatewayError> {
    let allowance = asset.read_allowance(user, spender).await?;
    Ok(AllowanceCheck {
        required: amount,
        allowance,
    })
}

/// Whether depositing `amount` into `pool` needs an approval first
pub async fn needs_approval<A: AssetGateway>(
    asset: &A,
    spender: &Address,
    user: &Address,
    pool: PoolId,
    amount: Amount,
) -> Result<bool, GatewayError> {
    if pool.is_native() {
        return Ok(false);
    }
    let check = check_allowance(asset, spender, user, amount).await?;
    Ok(requires_approval(pool, check.allowance, amount))
}

/// Approve `spender` for exactly `amount`
pub async fn approve<A: AssetGateway>(
    asset: &A,
    spender: &Address,
    user: &Address,
    amount: Amount,
) -> OperationResult {
    match asset.approve(spender, amount, user).await {
        Ok(tx_hash) => {
            tracing::info!(user = %user, spender = %spender, amount, tx_hash = %tx_hash, "approval submitted");
            OperationResult::Success { tx_hash }
        }
        Err(e) => {
            tracing::warn!(user = %user, amount, error = %e, "approval failed");
            OperationResult::Failure(OperationFailure::submission(&e))
        }
    }
}
