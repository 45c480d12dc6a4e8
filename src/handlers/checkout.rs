use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use tracing::debug;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::checkout::{CheckoutForm, CheckoutReceipt};
use crate::services::uploads::Upload;
use crate::ApiResponse;

/// Multipart fields larger than the screenshot limit are rejected by the
/// service; this only bounds the whole request body.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn checkout_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD_BYTES))
}

/// Reads the checkout form from a multipart body.
pub async fn read_checkout_form(mut multipart: Multipart) -> Result<CheckoutForm, ServiceError> {
    let mut form = CheckoutForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "method" => form.method = Some(field.text().await?),
            "amount" => form.amount = Some(field.text().await?),
            "table_id" | "table" => form.table_id = Some(field.text().await?),
            "remarks" => form.remarks = Some(field.text().await?),
            "screenshot" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.screenshot = Some(Upload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => debug!(field = other, "ignoring unknown checkout field"),
        }
    }
    Ok(form)
}

/// Place an order from the caller's cart
async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutReceipt>>), ServiceError> {
    let form = read_checkout_form(multipart).await?;
    let receipt = state.services.checkout.checkout(user.user_id, form).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))))
}
