use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::cart::{AddToCart, CartView, UpdateCartLine};
use crate::ApiResponse;

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart))
        .route("/cart/items", post(add_item))
        .route(
            "/cart/items/{product_id}",
            put(update_item).delete(remove_item),
        )
}

/// Current contents of the caller's cart
async fn view_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.view(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Add a product, or bump its quantity if it is already in the cart
async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AddToCart>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.add_item(user.user_id, request).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<i32>,
    Json(request): Json<UpdateCartLine>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state
        .services
        .cart
        .update_item(user.user_id, product_id, request)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<i32>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(user.user_id, product_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}
