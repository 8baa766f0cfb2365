//! Error types for the staking engine

use thiserror::Error;

use crate::{Amount, PoolId};

/// Core errors that can occur in the staking workspace
#[derive(Debug, Error)]
pub enum Error {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Address parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must be 40 hex characters, got {chars}")]
    Length { chars: usize },

    #[error("address is not valid hex: {0}")]
    InvalidHex(String),
}

/// Ledger and asset gateway errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Ledger unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Read {method} failed: {message}")]
    Read {
        method: &'static str,
        message: String,
    },

    #[error("Simulation of {method} reverted: {message}")]
    Simulation {
        method: &'static str,
        message: String,
    },

    #[error("Transaction rejected: {message}")]
    Rejected { message: String },
}

/// Snapshot build errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("Snapshot not ready: {reason}")]
    NotReady { reason: String },

    #[error("Snapshot read failed: {0}")]
    Read(#[from] GatewayError),

    #[error("Inconsistent withdraw amounts in {pool} pool: requested {requested} < ready {ready}")]
    DataIntegrity {
        pool: PoolId,
        requested: Amount,
        ready: Amount,
    },
}

/// Local precondition failures, detected before any ledger call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Not ready: {reason}")]
    NotReady { reason: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Unstake amount {requested} exceeds staked {staked}")]
    ExceedsStake { requested: Amount, staked: Amount },

    #[error("Nothing ready to withdraw from {pool} pool")]
    NothingToWithdraw { pool: PoolId },

    #[error("No pending reward in {pool} pool")]
    NothingToClaim { pool: PoolId },
}

/// Result type alias for staking operations
pub type Result<T> = std::result::Result<T, Error>;

impl GatewayError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "ledger_unreachable",
            Self::Read { .. } => "read_failed",
            Self::Simulation { .. } => "simulation_reverted",
            Self::Rejected { .. } => "tx_rejected",
        }
    }
}

impl SnapshotError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::Read(e) => e.error_code(),
            Self::DataIntegrity { .. } => "data_integrity",
        }
    }
}

impl ProtocolError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::ExceedsStake { .. } => "exceeds_stake",
            Self::NothingToWithdraw { .. } => "nothing_to_withdraw",
            Self::NothingToClaim { .. } => "nothing_to_claim",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } => 400,
            Self::InsufficientBalance { .. } | Self::ExceedsStake { .. } => 422,
            Self::NothingToWithdraw { .. } | Self::NothingToClaim { .. } => 422,
            Self::NotReady { .. } => 503,
        }
    }
}
