//! # API Error Types
//!
//! [`AppError`] is the single error type handlers return. Every service
//! error converts into it, and it renders as
//! `{"error": {"code": "...", "message": "..."}}` with the matching status.
//! Internal and upstream details are logged, never sent to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{OrderError, ProductError};
use crate::payments::PaymentError;
use crate::services::{AccountError, CartsError, CatalogError, CheckoutError, OrdersError};
use crate::store::StoreError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// 404.
    #[error("{0}")]
    NotFound(String),

    /// Malformed body, failed validation or a broken business rule (400).
    #[error("{0}")]
    InvalidInput(String),

    /// Missing, invalid or expired credentials, or a non-admin on an admin route (401).
    #[error("{0}")]
    Unauthorized(String),

    /// 409.
    #[error("{0}")]
    Conflict(String),

    /// The processor does not report the payment as succeeded (402).
    #[error("{0}")]
    PaymentNotConfirmed(String),

    /// The payment processor failed or is unreachable (502).
    #[error("{0}")]
    Upstream(String),

    /// 500. Logged, never returned to the client.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PaymentNotConfirmed(_) => (StatusCode::PAYMENT_REQUIRED, "PAYMENT_NOT_CONFIRMED"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream(_) => "The payment processor is unavailable".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) => tracing::error!(error = %self, "payment processor error"),
            _ => {}
        }

        let body = ErrorBody { error: ErrorDetail { code: code.to_string(), message } };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::IntentNotFound(_) => Self::NotFound(err.to_string()),
            PaymentError::InvalidIntentId(_) => Self::InvalidInput(err.to_string()),
            PaymentError::Config(_) => Self::Internal(err.to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => Self::NotFound(err.to_string()),
            CatalogError::Invalid(e) => e.into(),
            CatalogError::Store(e) => e.into(),
        }
    }
}

impl From<CartsError> for AppError {
    fn from(err: CartsError) -> Self {
        match err {
            CartsError::ProductNotFound(_) | CartsError::CartNotFound | CartsError::Item(_) => {
                Self::NotFound(err.to_string())
            }
            CartsError::Stock(e) => e.into(),
            CartsError::Store(e) => e.into(),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart | CheckoutError::InvalidMetadata(_) => Self::InvalidInput(err.to_string()),
            CheckoutError::CartNotFound(_) => Self::NotFound(err.to_string()),
            CheckoutError::PaymentNotConfirmed { .. } => Self::PaymentNotConfirmed(err.to_string()),
            CheckoutError::NotIntentOwner => Self::Unauthorized(err.to_string()),
            CheckoutError::Order(e) => e.into(),
            CheckoutError::Money(e) => Self::Internal(e.to_string()),
            CheckoutError::Payment(e) => e.into(),
            CheckoutError::Store(e) => e.into(),
        }
    }
}

impl From<OrdersError> for AppError {
    fn from(err: OrdersError) -> Self {
        match err {
            OrdersError::NotFound(_) => Self::NotFound(err.to_string()),
            OrdersError::Order(e) => e.into(),
            OrdersError::Store(e) => e.into(),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::EmailTaken(_) => Self::Conflict(err.to_string()),
            AccountError::InvalidCredentials
            | AccountError::NotAdmin
            | AccountError::InvalidToken(_)
            | AccountError::InvalidSession
            | AccountError::SessionExpired => Self::Unauthorized(err.to_string()),
            AccountError::UserNotFound(_) => Self::NotFound(err.to_string()),
            AccountError::WeakPassword | AccountError::MissingName | AccountError::CannotDeleteSelf => {
                Self::InvalidInput(err.to_string())
            }
            AccountError::Password(e) => Self::Internal(e.to_string()),
            AccountError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use uuid::Uuid;

    async fn render(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_renders_message() {
        let (status, body) = render(CatalogError::NotFound(Uuid::nil()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("not found"));
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = render(StoreError::Corrupt("row 7 has negative stock".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("row 7"));
    }

    #[tokio::test]
    async fn processor_outage_is_bad_gateway() {
        let err: AppError = CheckoutError::Payment(PaymentError::Unreachable("10.0.0.3:443 refused".into())).into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error.code, "UPSTREAM_ERROR");
        assert!(!body.error.message.contains("10.0.0.3"));
    }

    #[test]
    fn malformed_intent_id_is_client_error() {
        let err: AppError = PaymentError::InvalidIntentId("../charges/ch_1".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn checkout_errors_map_to_distinct_statuses() {
        let unconfirmed: AppError =
            CheckoutError::PaymentNotConfirmed { payment_intent_id: "pi_1".into(), status: "processing" }.into();
        assert_eq!(unconfirmed.status_and_code(), (StatusCode::PAYMENT_REQUIRED, "PAYMENT_NOT_CONFIRMED"));

        let empty: AppError = CheckoutError::EmptyCart.into();
        assert_eq!(empty.status_and_code().0, StatusCode::BAD_REQUEST);

        let stranger: AppError = CheckoutError::NotIntentOwner.into();
        assert_eq!(stranger.status_and_code().0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn cart_errors_map_to_not_found_or_invalid_input() {
        let stock: AppError =
            CartsError::Stock(ProductError::InsufficientStock { product_id: Uuid::nil(), requested: 3, available: 1 }).into();
        assert_eq!(stock.status_and_code().0, StatusCode::BAD_REQUEST);
        let missing: AppError = CartsError::CartNotFound.into();
        assert_eq!(missing.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn account_errors_map_to_auth_statuses() {
        let taken: AppError = AccountError::EmailTaken("a@b.c".into()).into();
        assert_eq!(taken.status_and_code(), (StatusCode::CONFLICT, "CONFLICT"));
        let expired: AppError = AccountError::SessionExpired.into();
        assert_eq!(expired.status_and_code().0, StatusCode::UNAUTHORIZED);
        let conflict: AppError = StoreError::Conflict("cart modified".into()).into();
        assert_eq!(conflict.status_and_code().0, StatusCode::CONFLICT);
    }
}
