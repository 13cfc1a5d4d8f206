//! In-process payment processor for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{validate_intent_id, IntentStatus, NewPaymentIntent, PaymentError, PaymentGateway, PaymentIntent};

#[derive(Debug, Default)]
struct Ledger {
    intents: HashMap<String, PaymentIntent>,
    by_idempotency_key: HashMap<String, String>,
}

/// Keeps intents in memory. With `auto_confirm` every intent is created
/// already succeeded; otherwise call [`InMemoryGateway::confirm`].
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    auto_confirm: bool,
    ledger: Mutex<Ledger>,
}

impl InMemoryGateway {
    pub fn new(auto_confirm: bool) -> Self {
        Self { auto_confirm, ledger: Mutex::default() }
    }

    /// Mark an intent as paid. Returns `false` for an unknown id.
    pub fn confirm(&self, id: &str) -> bool {
        self.set_status(id, IntentStatus::Succeeded)
    }

    pub fn set_status(&self, id: &str, status: IntentStatus) -> bool {
        match self.ledger.lock().intents.get_mut(id) {
            Some(intent) => {
                intent.status = status;
                true
            }
            None => false,
        }
    }

    pub fn intent_count(&self) -> usize {
        self.ledger.lock().intents.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_intent(&self, request: NewPaymentIntent) -> Result<PaymentIntent, PaymentError> {
        let mut ledger = self.ledger.lock();
        if let Some(existing) = ledger.by_idempotency_key.get(&request.idempotency_key) {
            if let Some(intent) = ledger.intents.get(existing) {
                return Ok(intent.clone());
            }
        }

        let id = format!("pi_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{id}_secret_{}", Uuid::new_v4().simple())),
            id: id.clone(),
            amount: request.amount,
            currency: request.currency,
            status: if self.auto_confirm { IntentStatus::Succeeded } else { IntentStatus::RequiresPaymentMethod },
            metadata: request.metadata,
        };
        ledger.by_idempotency_key.insert(request.idempotency_key, id.clone());
        ledger.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        validate_intent_id(id)?;
        self.ledger.lock().intents.get(id).cloned().ok_or_else(|| PaymentError::IntentNotFound(id.to_string()))
    }
}
