use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::provisioning::{NewAccount, ProvisionedAccount};
use crate::ApiResponse;

#[derive(Debug, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: user::Model,
    pub permissions: Vec<String>,
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

pub fn user_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(create_user))
        .route("/admin/users/{id}", get(get_user))
}

/// The caller's account, running order counters and permissions
async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Profile>>, ServiceError> {
    let user = state.services.provisioning.get_user(auth.user_id).await?;
    Ok(Json(ApiResponse::success(Profile {
        user,
        permissions: auth.permissions,
    })))
}

/// Create an account together with its wallet
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<NewAccount>,
) -> Result<(StatusCode, Json<ApiResponse<ProvisionedAccount>>), ServiceError> {
    let account = state.services.provisioning.create_account(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<user::Model>>, ServiceError> {
    let user = state.services.provisioning.get_user(user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}
