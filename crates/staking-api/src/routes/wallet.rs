//! Wallet connection endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::dto::{ApiError, ApiResult, ConnectRequest, WalletResponse};
use crate::{AppState, Backend};

/// Create wallet routes
pub fn router<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/", get(get_wallet::<B>))
        .route("/connect", post(connect::<B>))
        .route("/disconnect", post(disconnect::<B>))
}

/// GET /wallet - Current wallet connection
async fn get_wallet<B: Backend>(State(state): State<AppState<B>>) -> Json<WalletResponse> {
    let wallet = state.wallet().await;
    Json(WalletResponse {
        connected: wallet.is_some(),
        address: wallet.as_ref().map(|w| w.address.to_string()),
        network: state.network().as_str().to_string(),
        connected_secs: wallet.map(|w| w.connected_at.elapsed().as_secs()),
    })
}

/// POST /wallet/connect - Connect a wallet and load its positions
async fn connect<B: Backend>(
    State(state): State<AppState<B>>,
    Json(request): Json<ConnectRequest>,
) -> ApiResult<WalletResponse> {
    let snapshot = state.set_wallet(&request.address).await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("invalid_address", e.to_string())),
        )
    })?;

    if let Some(error) = &snapshot.error {
        tracing::warn!(address = %request.address, error = %error, "connected, initial snapshot failed");
    }

    Ok(get_wallet(State(state)).await)
}

/// POST /wallet/disconnect - Disconnect the wallet
async fn disconnect<B: Backend>(State(state): State<AppState<B>>) -> Json<WalletResponse> {
    state.disconnect_wallet().await;
    get_wallet(State(state)).await
}
