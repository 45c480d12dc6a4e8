use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{OrderDetail, OrderView};
use crate::services::Page;
use crate::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct OrderViewQuery {
    #[serde(default)]
    pub view: OrderView,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_my_orders))
        .route("/orders/{id}", get(get_order))
}

/// List the caller's orders for one tab (`current`, `history` or `cancelled`)
async fn list_my_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(view): Query<OrderViewQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<Page<OrderDetail>>>, ServiceError> {
    let page = pagination.to_request(&state.config);
    let orders = state
        .services
        .orders
        .list_for_user(user.user_id, view.view, page)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Get one order with its items and payment
pub(crate) async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<i32>,
) -> Result<Json<ApiResponse<OrderDetail>>, ServiceError> {
    let order = state.services.orders.get_order(&user, order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}
