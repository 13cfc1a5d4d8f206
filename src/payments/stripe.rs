//! Stripe-compatible HTTP payment gateway.
//!
//! | Operation | Method | Path |
//! |-----------|--------|------|
//! | create intent | POST (form) | `/v1/payment_intents` |
//! | retrieve intent | GET | `/v1/payment_intents/{id}` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use super::retry::Backoff;
use super::{validate_intent_id, NewPaymentIntent, PaymentError, PaymentGateway, PaymentIntent};

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    backoff: Backoff,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, PaymentError> {
        let base_url = Url::parse(base_url).map_err(|e| PaymentError::Config(format!("base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(PaymentError::Config(format!("base URL {base_url} cannot carry a path")));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PaymentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url, api_key: api_key.into(), backoff: Backoff::default() })
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentError::Config(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

async fn decode_intent(resp: reqwest::Response, intent_id: Option<&str>) -> Result<PaymentIntent, PaymentError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = intent_id {
            return Err(PaymentError::IntentNotFound(id.to_string()));
        }
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PaymentError::Rejected { status: status.as_u16(), body });
    }
    resp.json::<PaymentIntent>().await.map_err(|e| PaymentError::Decode(e.to_string()))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(&self, request: NewPaymentIntent) -> Result<PaymentIntent, PaymentError> {
        let mut form = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let url = self.endpoint(&["v1", "payment_intents"])?;
        let resp = self
            .backoff
            .send("create intent", || {
                self.client
                    .post(url.clone())
                    .bearer_auth(&self.api_key)
                    .header("Idempotency-Key", &request.idempotency_key)
                    .form(&form)
                    .send()
            })
            .await?;

        let intent = decode_intent(resp, None).await?;
        tracing::info!(payment_intent_id = %intent.id, amount = intent.amount, "payment intent created");
        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        validate_intent_id(id)?;
        let url = self.endpoint(&["v1", "payment_intents", id])?;
        let resp = self
            .backoff
            .send("retrieve intent", || self.client.get(url.clone()).bearer_auth(&self.api_key).send())
            .await?;

        let intent = decode_intent(resp, Some(id)).await?;
        if intent.id != id {
            return Err(PaymentError::Decode(format!("asked for intent {id}, processor returned {}", intent.id)));
        }
        Ok(intent)
    }
}
