//! Staking Protocol Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use multipool::{parse_amount, OperationResult, PoolConfig};
use staking_core::{Amount, PoolId};

use crate::dto::{
    failure_status, AmountRequest, ApiError, ApiResult, ApprovalQuery, ApprovalResponse,
    ApproveRequest, OperationResponse, PoolDto, PoolRequest, SnapshotResponse, SummaryResponse,
};
use crate::{AppState, Backend};

/// Create staking routes
pub fn router<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/snapshot", get(get_snapshot::<B>))
        .route("/summary", get(get_summary::<B>))
        .route("/pools/:pool", get(get_pool::<B>))
        .route("/refresh", post(refresh::<B>))
        .route("/approval", get(get_approval::<B>))
        .route("/approve", post(approve::<B>))
        .route("/stake", post(stake::<B>))
        .route("/unstake", post(unstake::<B>))
        .route("/withdraw", post(withdraw::<B>))
        .route("/claim", post(claim::<B>))
}

type RouteError = (StatusCode, Json<ApiError>);

fn parse_pool(text: &str) -> Result<PoolId, RouteError> {
    text.parse::<PoolId>().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("invalid_pool", e)),
        )
    })
}

fn parse_pool_amount(config: &PoolConfig, text: &str) -> Result<Amount, RouteError> {
    parse_amount(text, config.decimals)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::from(&e))))
}

fn respond(result: OperationResult, config: &PoolConfig) -> ApiResult<OperationResponse> {
    OperationResponse::from_result(result, config.decimals)
        .map(Json)
        .map_err(|(status, error)| (status, Json(error)))
}

async fn snapshot_response<B: Backend>(state: &AppState<B>) -> SnapshotResponse {
    let engine = state.engine();
    let snapshot = engine.snapshot().await;
    let pools = engine.pools();
    SnapshotResponse::new(
        &snapshot,
        [&pools.native, &pools.asset],
        engine.is_ready().await,
        engine.is_loading(),
    )
}

// =============================================================================
// Reads
// =============================================================================

/// GET /staking/snapshot - Latest snapshot for the connected wallet
async fn get_snapshot<B: Backend>(State(state): State<AppState<B>>) -> Json<SnapshotResponse> {
    Json(snapshot_response(&state).await)
}

/// GET /staking/summary - Per-pool stats and cross-pool totals
async fn get_summary<B: Backend>(State(state): State<AppState<B>>) -> Json<SummaryResponse> {
    let engine = state.engine();
    let snapshot = engine.snapshot().await;
    let pools = engine.pools();
    Json(SummaryResponse::new(
        snapshot.version,
        &snapshot.summary(),
        &pools.native,
        &pools.asset,
    ))
}

/// GET /staking/pools/:pool - One pool with the user's position
async fn get_pool<B: Backend>(
    State(state): State<AppState<B>>,
    Path(pool): Path<String>,
) -> ApiResult<PoolDto> {
    let pool = parse_pool(&pool)?;
    let engine = state.engine();
    let snapshot = engine.snapshot().await;
    Ok(Json(PoolDto::from_snapshot(engine.pool_config(pool), &snapshot)))
}

/// POST /staking/refresh - Re-read all state now
async fn refresh<B: Backend>(State(state): State<AppState<B>>) -> Json<SnapshotResponse> {
    state.engine().refresh().await;
    Json(snapshot_response(&state).await)
}

/// GET /staking/approval?pool=&amount= - Whether a stake needs approval first
async fn get_approval<B: Backend>(
    State(state): State<AppState<B>>,
    Query(query): Query<ApprovalQuery>,
) -> ApiResult<ApprovalResponse> {
    let pool = parse_pool(&query.pool)?;
    let engine = state.engine();
    let amount = parse_pool_amount(engine.pool_config(pool), &query.amount)?;

    let needs_approval = engine
        .needs_approval(pool, amount)
        .await
        .map_err(|f| (failure_status(&f), Json(ApiError::from(&f))))?;

    Ok(Json(ApprovalResponse {
        pool,
        amount: query.amount,
        needs_approval,
    }))
}

// =============================================================================
// Operations
// =============================================================================

/// POST /staking/approve - Approve the ledger for exactly the given asset amount
async fn approve<B: Backend>(
    State(state): State<AppState<B>>,
    Json(request): Json<ApproveRequest>,
) -> ApiResult<OperationResponse> {
    let engine = state.engine();
    let config = engine.pool_config(PoolId::Asset);
    let amount = parse_pool_amount(config, &request.amount)?;
    respond(engine.approve(amount).await, config)
}

/// POST /staking/stake - Deposit into a pool
async fn stake<B: Backend>(
    State(state): State<AppState<B>>,
    Json(request): Json<AmountRequest>,
) -> ApiResult<OperationResponse> {
    let engine = state.engine();
    let config = engine.pool_config(parse_pool(&request.pool)?);
    let amount = parse_pool_amount(config, &request.amount)?;
    respond(engine.stake(config.pool, amount).await, config)
}

/// POST /staking/unstake - Request unstake from a pool
async fn unstake<B: Backend>(
    State(state): State<AppState<B>>,
    Json(request): Json<AmountRequest>,
) -> ApiResult<OperationResponse> {
    let engine = state.engine();
    let config = engine.pool_config(parse_pool(&request.pool)?);
    let amount = parse_pool_amount(config, &request.amount)?;
    respond(engine.unstake(config.pool, amount).await, config)
}

/// POST /staking/withdraw - Withdraw everything whose lock has elapsed
async fn withdraw<B: Backend>(
    State(state): State<AppState<B>>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<OperationResponse> {
    let engine = state.engine();
    let config = engine.pool_config(parse_pool(&request.pool)?);
    respond(engine.withdraw(config.pool).await, config)
}

/// POST /staking/claim - Claim pending reward
async fn claim<B: Backend>(
    State(state): State<AppState<B>>,
    Json(request): Json<PoolRequest>,
) -> ApiResult<OperationResponse> {
    let engine = state.engine();
    let config = engine.pool_config(parse_pool(&request.pool)?);
    respond(engine.claim(config.pool).await, config)
}
