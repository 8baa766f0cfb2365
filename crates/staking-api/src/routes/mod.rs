//! API route handlers

pub mod health;
pub mod staking;
pub mod wallet;

use axum::{routing::get, Router};

use crate::{AppState, Backend};

/// Create the API router with all routes
pub fn create_router<B: Backend>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/wallet", wallet::router())
        .nest("/staking", staking::router())
        .with_state(state)
}
