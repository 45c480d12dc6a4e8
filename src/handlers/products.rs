use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::entities::category;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::catalog::ProductView;
use crate::ApiResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<i32>,
    /// Staff only; ignored for customers.
    #[serde(default)]
    pub include_inactive: bool,
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/categories", get(list_categories))
}

async fn list_products(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductView>>>, ServiceError> {
    let include_inactive = query.include_inactive && user.is_staff();
    let products = state
        .services
        .catalog
        .list_products(query.category_id, include_inactive)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

async fn get_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<i32>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let product = state.services.catalog.get_product(product_id).await?;
    if !product.is_active && !user.is_staff() {
        return Err(ServiceError::NotFound(format!(
            "Product {product_id} not found"
        )));
    }
    Ok(Json(ApiResponse::success(product)))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<category::Model>>>, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}
