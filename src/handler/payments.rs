use std::sync::Arc;

use axum::{response::IntoResponse, routing::post, Extension, Json, Router};
use validator::Validate;

use crate::{
    dtos::{paymentdtos::MockPaymentDto, ApiResponse},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn payments_handler() -> Router {
    Router::new().route("/mock-pay", post(mock_pay))
}

pub async fn mock_pay(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<MockPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let receipt = app_state
        .payment_service
        .mock_pay(auth.user.id, body)
        .await?;

    Ok(Json(ApiResponse::success("Payment processed", receipt)))
}
