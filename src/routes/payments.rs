//! # Payment Routes
//!
//! - `POST /api/payments/create-payment-intent` open an intent for the cart total
//! - `POST /api/payments/payment-success`       turn a confirmed intent into an order

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth::AuthUser;
use crate::domain::aggregates::Order;
use crate::error::AppError;
use crate::extractors::extract_validated_json;
use crate::payments::validate_intent_id;
use crate::services::PaymentIntentCreated;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/payment-success", post(payment_success))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessRequest {
    #[validate(custom = "intent_id_shape")]
    pub payment_intent_id: String,
}

fn intent_id_shape(id: &str) -> Result<(), ValidationError> {
    validate_intent_id(id).map_err(|_| {
        let mut err = ValidationError::new("intent_id");
        err.message = Some("paymentIntentId must be pi_ followed by letters, digits or underscores".into());
        err
    })
}

#[derive(Debug, Serialize)]
pub struct PaymentSuccessResponse {
    pub success: bool,
    pub order: Order,
}

async fn create_payment_intent(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PaymentIntentCreated>, AppError> {
    Ok(Json(state.checkout.create_payment_intent(user.id()).await?))
}

async fn payment_success(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<PaymentSuccessRequest>, JsonRejection>,
) -> Result<Json<PaymentSuccessResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let outcome = state.checkout.handle_payment_success(&user.user, &req.payment_intent_id).await?;
    Ok(Json(PaymentSuccessResponse { success: true, order: outcome.order }))
}
