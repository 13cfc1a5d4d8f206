//! Checkout: payment intents and order materialization.
//!
//! The processor is the source of truth for payment. An order is created at
//! most once per payment intent: a repeated success notification returns the
//! order that already exists and changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::carts::reprice;
use super::locks::CartLocks;
use crate::domain::aggregates::{Order, OrderError, Product, User};
use crate::domain::events::{CartEvent, DomainEvent, OrderEvent, ProductEvent};
use crate::domain::value_objects::{Currency, Money, MoneyError};
use crate::payments::{
    IntentStatus, NewPaymentIntent, PaymentError, PaymentGateway, PaymentIntent, META_CART_ID, META_USER_ID,
};
use crate::publisher::EventPublisher;
use crate::store::{CartStore, OrderStore, ProductStore, StoreError};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("cart {0} not found")]
    CartNotFound(Uuid),

    #[error("payment {payment_intent_id} is not confirmed (status: {status})")]
    PaymentNotConfirmed { payment_intent_id: String, status: &'static str },

    #[error("payment intent metadata is invalid: {0}")]
    InvalidMetadata(String),

    #[error("payment intent belongs to another user")]
    NotIntentOwner,

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentCreated {
    pub client_secret: String,
    pub payment_intent_id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct PaymentOutcome {
    pub order: Order,
    /// `false` when the order already existed for this payment intent.
    pub created: bool,
}

#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    locks: CartLocks,
    events: EventPublisher,
    currency: Currency,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: Arc<dyn CartStore>,
        products: Arc<dyn ProductStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        locks: CartLocks,
        events: EventPublisher,
        currency: Currency,
    ) -> Self {
        Self { carts, products, orders, gateway, locks, events, currency }
    }

    /// Request a processor intent for the cart total at current prices.
    ///
    /// The cart is repriced first and saved when that changes it, so the
    /// amount charged, the cached total and the line items agree.
    pub async fn create_payment_intent(&self, user_id: Uuid) -> Result<PaymentIntentCreated, CheckoutError> {
        let guard = self.locks.lock(user_id).await;
        let mut cart = self
            .carts
            .find_by_user(user_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;

        let (lines_before, total_before) = (cart.items().len(), cart.total());
        reprice(self.products.as_ref(), &mut cart).await?;
        if cart.items().len() != lines_before || cart.total() != total_before {
            cart = self.carts.save(&cart).await?;
            tracing::info!(
                cart_id = %cart.id(),
                total = %cart.total(),
                previous_total = %total_before,
                "cart repriced before checkout"
            );
        }
        drop(guard);
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let amount = Money::new(cart.total(), self.currency.clone()).to_minor_units()?;
        let metadata = HashMap::from([
            (META_USER_ID.to_string(), user_id.to_string()),
            (META_CART_ID.to_string(), cart.id().to_string()),
        ]);
        let intent = self
            .gateway
            .create_intent(NewPaymentIntent {
                amount,
                currency: self.currency.as_str().to_string(),
                metadata,
                idempotency_key: format!("cart-{}-v{}-{amount}", cart.id(), cart.version()),
            })
            .await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Decode(format!("intent {} has no client secret", intent.id)))?;

        tracing::info!(%user_id, cart_id = %cart.id(), payment_intent_id = %intent.id, amount, "payment intent ready");
        Ok(PaymentIntentCreated { client_secret, payment_intent_id: intent.id, amount, currency: intent.currency })
    }

    /// Turn a confirmed payment into an order, decrement stock and clear the cart.
    pub async fn handle_payment_success(&self, caller: &User, payment_intent_id: &str) -> Result<PaymentOutcome, CheckoutError> {
        let intent = self.gateway.retrieve_intent(payment_intent_id).await?;
        if intent.status != IntentStatus::Succeeded {
            return Err(CheckoutError::PaymentNotConfirmed {
                payment_intent_id: intent.id,
                status: intent.status.as_str(),
            });
        }

        let user_id = metadata_uuid(&intent, META_USER_ID)?;
        let cart_id = metadata_uuid(&intent, META_CART_ID)?;
        if caller.id != user_id && !caller.is_admin {
            return Err(CheckoutError::NotIntentOwner);
        }

        let _guard = self.locks.lock(user_id).await;

        if let Some(order) = self.orders.find_by_payment_intent(&intent.id).await? {
            tracing::info!(order_id = %order.id(), payment_intent_id = %intent.id, "order already materialized");
            return Ok(PaymentOutcome { order, created: false });
        }

        let mut cart = self.carts.find(cart_id).await?.ok_or(CheckoutError::CartNotFound(cart_id))?;
        if cart.user_id() != user_id {
            return Err(CheckoutError::InvalidMetadata(format!("cart {cart_id} does not belong to user {user_id}")));
        }
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let expected = Money::new(cart.total(), self.currency.clone()).to_minor_units()?;
        if expected != intent.amount {
            tracing::warn!(
                cart_id = %cart.id(),
                payment_intent_id = %intent.id,
                intent_amount = intent.amount,
                cart_amount = expected,
                "cart total changed after the payment intent was created"
            );
        }

        let products: HashMap<Uuid, Product> =
            self.products.find_many(&cart.product_ids()).await?.into_iter().map(|p| (p.id, p)).collect();
        for missing in cart.product_ids().into_iter().filter(|id| !products.contains_key(id)) {
            tracing::error!(
                cart_id = %cart.id(),
                payment_intent_id = %intent.id,
                product_id = %missing,
                "paid line left out of the order, product is no longer in the catalog"
            );
        }
        let currency = Currency::new(intent.currency.as_str()).unwrap_or_else(|_| self.currency.clone());
        let order = Order::from_paid_cart(&cart, &products, intent.id.clone(), currency, Utc::now())?;

        match self.orders.insert(&order).await {
            Ok(()) => {}
            Err(StoreError::Conflict(reason)) => {
                // Another process won the race for this intent.
                return match self.orders.find_by_payment_intent(&intent.id).await? {
                    Some(existing) => Ok(PaymentOutcome { order: existing, created: false }),
                    None => Err(StoreError::Conflict(reason).into()),
                };
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(
            order_id = %order.id(),
            %user_id,
            payment_intent_id = %intent.id,
            total = %order.total_price(),
            "order placed"
        );

        for item in order.items() {
            match self.products.decrement_stock(item.product_id, item.quantity).await {
                Ok(true) => {
                    self.events
                        .publish(DomainEvent::Product(ProductEvent::StockDecremented {
                            product_id: item.product_id,
                            quantity: item.quantity,
                        }))
                        .await;
                }
                Ok(false) => tracing::warn!(
                    order_id = %order.id(),
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    "oversell: stock too low to decrement, left unchanged"
                ),
                Err(e) => tracing::error!(
                    order_id = %order.id(),
                    product_id = %item.product_id,
                    error = %e,
                    "failed to decrement stock"
                ),
            }
        }

        cart.clear();
        match self.carts.save(&cart).await {
            Ok(cleared) => {
                self.events
                    .publish(DomainEvent::Cart(CartEvent::Cleared { cart_id: cleared.id(), user_id: cleared.user_id() }))
                    .await;
            }
            Err(e) => tracing::error!(order_id = %order.id(), cart_id = %cart.id(), error = %e, "failed to clear cart after order"),
        }

        self.events
            .publish(DomainEvent::Order(OrderEvent::Placed {
                order_id: order.id(),
                user_id: order.user_id(),
                total: order.total_price(),
                payment_intent_id: order.payment_intent_id().to_string(),
            }))
            .await;

        Ok(PaymentOutcome { order, created: true })
    }
}

fn metadata_uuid(intent: &PaymentIntent, key: &str) -> Result<Uuid, CheckoutError> {
    let raw = intent
        .metadata
        .get(key)
        .ok_or_else(|| CheckoutError::InvalidMetadata(format!("missing {key}")))?;
    Uuid::parse_str(raw).map_err(|_| CheckoutError::InvalidMetadata(format!("{key} is not a valid id")))
}
