//! Canteen API Library
//!
//! Order lifecycle and payment settlement for a campus canteen: carts,
//! checkout, wallet ledger, table occupancy and role-gated order status.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{perm, AuthRouterExt, AuthService};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let auth = Arc::new(
            AuthService::new(auth::AuthConfig::from(&config)).with_accounts(db.clone()),
        );
        let services = handlers::AppServices::new(db.clone(), &config);
        Self {
            db,
            config,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_is_optional() {
        let plain = ApiResponse::success(1);
        assert!(plain.message.is_none());
        let with = ApiResponse::success(1).with_message("done");
        assert_eq!(with.message.as_deref(), Some("done"));
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned API routes, each group gated by the permission it needs.
pub fn api_v1_routes(config: &config::AppConfig) -> Router<AppState> {
    let client = Router::new()
        .merge(handlers::checkout::checkout_routes(config.max_upload_bytes))
        .merge(handlers::orders::order_routes())
        .merge(handlers::carts::cart_routes())
        .merge(handlers::wallet::wallet_routes())
        .with_permission(perm::USE_CLIENT_PANEL);

    let profile = handlers::users::profile_routes().with_auth();

    let catalog = handlers::products::product_routes().with_permission(perm::VIEW_PRODUCTS);
    let tables = handlers::tables::table_routes().with_permission(perm::VIEW_TABLES);

    let orders_read = handlers::admin::order_read_routes().with_permission(perm::VIEW_ORDERS);
    let orders_manage = handlers::admin::order_manage_routes().with_permission(perm::MANAGE_ORDERS);
    let payments_read = handlers::admin::payment_read_routes().with_permission(perm::VIEW_PAYMENTS);
    let payments_manage =
        handlers::admin::payment_manage_routes().with_permission(perm::MANAGE_PAYMENTS);
    let dashboard = handlers::admin::dashboard_routes().with_permission(perm::VIEW_DASHBOARD);
    let wallets = handlers::wallet::wallet_admin_routes().with_permission(perm::MANAGE_WALLETS);
    let users = handlers::users::user_admin_routes().with_permission(perm::MANAGE_USERS);

    Router::new()
        .route("/status", get(api_status))
        .merge(client)
        .merge(profile)
        .merge(catalog)
        .merge(tables)
        .merge(orders_read)
        .merge(orders_manage)
        .merge(payments_read)
        .merge(payments_manage)
        .merge(dashboard)
        .merge(wallets)
        .merge(users)
}

/// Full application router: health, the v1 API and the request-scoped layers.
pub fn build_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes(&state.config))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status() -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "canteen-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
