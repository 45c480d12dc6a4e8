use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::entities::wallet;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::wallet::{TopUpRequest, WalletStatement};
use crate::ApiResponse;

pub fn wallet_routes() -> Router<AppState> {
    Router::new().route("/get-wallet", get(get_wallet))
}

pub fn wallet_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users/{id}/wallet", get(get_user_wallet))
        .route("/admin/users/{id}/wallet/top-up", post(top_up))
}

/// The caller's wallet balance and transaction history
async fn get_wallet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<WalletStatement>>, ServiceError> {
    let page = pagination.to_request(&state.config);
    let statement = state.services.wallet.statement(user.user_id, page).await?;
    Ok(Json(ApiResponse::success(statement)))
}

async fn get_user_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<WalletStatement>>, ServiceError> {
    let page = pagination.to_request(&state.config);
    let statement = state.services.wallet.statement(user_id, page).await?;
    Ok(Json(ApiResponse::success(statement)))
}

/// Credit a customer's wallet
async fn top_up(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<ApiResponse<wallet::Model>>, ServiceError> {
    let wallet = state
        .services
        .wallet
        .top_up(actor.user_id, user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(wallet)))
}
