//! # Payment processor bridge
//!
//! [`PaymentGateway`] abstracts the external processor. Production uses
//! [`stripe::HttpPaymentGateway`] against a Stripe-compatible REST API;
//! development and tests use [`memory::InMemoryGateway`].
//!
//! The processor is authoritative: a payment only counts once a retrieved
//! intent reports [`IntentStatus::Succeeded`].

pub mod memory;
mod retry;
pub mod stripe;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use memory::InMemoryGateway;
pub use stripe::HttpPaymentGateway;

/// Metadata key carrying the paying user's id.
pub const META_USER_ID: &str = "userId";
/// Metadata key carrying the cart the intent was created for.
pub const META_CART_ID: &str = "cartId";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        }
    }
}

/// A payment intent as reported by the processor.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct NewPaymentIntent {
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
    /// Requests with the same key create at most one intent.
    pub idempotency_key: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    /// The processor could not be reached.
    #[error("payment processor unreachable: {0}")]
    Unreachable(String),

    /// The processor has no intent with this id.
    #[error("payment intent {0} not found")]
    IntentNotFound(String),

    /// The processor answered with an error status.
    #[error("payment processor returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The processor's response could not be decoded.
    #[error("unexpected payment processor response: {0}")]
    Decode(String),

    /// The id is not shaped like a processor intent id.
    #[error("invalid payment intent id {0:?}")]
    InvalidIntentId(String),

    /// The gateway cannot be built from its configuration.
    #[error("payment processor misconfigured: {0}")]
    Config(String),
}

/// Intent ids are `pi_` followed by ASCII letters, digits or underscores.
pub fn validate_intent_id(id: &str) -> Result<(), PaymentError> {
    let shaped = id
        .strip_prefix("pi_")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'));
    if shaped {
        Ok(())
    } else {
        Err(PaymentError::InvalidIntentId(id.to_string()))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: NewPaymentIntent) -> Result<PaymentIntent, PaymentError>;
    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError>;
}
