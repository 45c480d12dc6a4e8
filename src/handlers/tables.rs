use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::entities::table_update_log;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::tables::TableView;
use crate::ApiResponse;

const MAX_LOG_LINES: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_log_limit")]
    pub limit: u64,
}

fn default_log_limit() -> u64 {
    20
}

pub fn table_routes() -> Router<AppState> {
    Router::new()
        .route("/tables", get(list_tables))
        .route("/tables/updates", get(recent_updates))
}

/// Tables with free seats, seated customers and running order value
async fn list_tables(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TableView>>>, ServiceError> {
    let tables = state.services.tables.list().await?;
    Ok(Json(ApiResponse::success(tables)))
}

/// Recent occupancy changes
async fn recent_updates(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ApiResponse<Vec<table_update_log::Model>>>, ServiceError> {
    let logs = state
        .services
        .tables
        .recent_updates(query.limit.clamp(1, MAX_LOG_LINES))
        .await?;
    Ok(Json(ApiResponse::success(logs)))
}
