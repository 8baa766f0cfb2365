//! staking-api: HTTP API layer for the multi-pool staking engine
//!
//! Exposes the engine's snapshot, accessors and operations to a frontend.
//! Amounts cross the wire as decimal strings.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{AppState, Backend, WalletState};
