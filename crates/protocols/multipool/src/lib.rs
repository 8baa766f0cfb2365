//! Multi-Pool Staking Position Engine
//!
//! Users deposit into one of two pools (native coin or a fungible asset),
//! request unstake, wait out the ledger's lock period, withdraw, and claim
//! rewards separately. The ledger owns every balance; this crate reads it into
//! immutable snapshots, drives the approve-then-deposit protocol for the asset
//! pool, and guards each lifecycle call against the latest snapshot.

pub mod approval;
pub mod calculator;
pub mod constants;
pub mod engine;
pub mod fetch;
pub mod lifecycle;
pub mod state;

// Re-exports
pub use calculator::{format_amount, parse_amount, preset_amount};
pub use constants::{pool_configs, AMOUNT_PRESETS};
pub use engine::StakingEngine;
pub use fetch::fetch_position_state;
pub use state::{
    AssetInfo, FailureKind, OperationFailure, OperationKind, OperationResult, PerPool,
    PoolConfig, PoolSnapshot, PoolStats, PositionState, Snapshot, StatsSummary, Totals,
    UserPosition,
};
