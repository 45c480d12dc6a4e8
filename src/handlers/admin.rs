//! Staff endpoints. Each router is gated by a permission in
//! [`crate::api_v1_routes`]; finer role checks live in the services.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::dashboard::DashboardSummary;
use crate::services::orders::{OrderDetail, OrderFilter, PaymentSummary, StatusUpdate};
use crate::services::payments::{PaymentFilter, PaymentRow};
use crate::services::Page;
use crate::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    #[serde(default)]
    pub status: String,
    pub prepare_duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusBody {
    #[serde(default)]
    pub status: String,
}

pub fn order_read_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/{id}", get(super::orders::get_order))
}

pub fn order_manage_routes() -> Router<AppState> {
    Router::new().route("/admin/orders/{id}/update-status", post(update_order_status))
}

pub fn payment_read_routes() -> Router<AppState> {
    Router::new().route("/admin/payments", get(list_payments))
}

pub fn payment_manage_routes() -> Router<AppState> {
    Router::new().route(
        "/admin/orders/{id}/update-payment-status",
        post(update_payment_status),
    )
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/admin/dashboard", get(dashboard))
}

/// List orders across all customers
async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<Page<OrderDetail>>>, ServiceError> {
    let page = pagination.to_request(&state.config);
    let orders = state.services.orders.list_all(filter, page).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Move an order to a new status
async fn update_order_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<i32>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<ApiResponse<OrderDetail>>, ServiceError> {
    let order = state
        .services
        .orders
        .update_status(
            &user,
            order_id,
            StatusUpdate {
                status: body.status,
                prepare_duration: body.prepare_duration,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Override the payment status of an order
async fn update_payment_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<i32>,
    Json(body): Json<UpdatePaymentStatusBody>,
) -> Result<Json<ApiResponse<PaymentSummary>>, ServiceError> {
    let payment = state
        .services
        .payments
        .update_status(&user, order_id, &body.status)
        .await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// List payments with status, method and free-text filters
async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<Page<PaymentRow>>>, ServiceError> {
    let page = pagination.to_request(&state.config);
    let payments = state.services.payments.list(filter, page).await?;
    Ok(Json(ApiResponse::success(payments)))
}

async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    let summary = state.services.dashboard.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
