//! Order Aggregate

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Product};
use crate::domain::value_objects::Currency;

/// A completed purchase. Items are snapshots taken at purchase time and never
/// follow later catalog edits.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    #[serde(rename = "orderItems")]
    items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    total_price: Decimal,
    currency: Currency,
    payment_intent_id: String,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub image: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Persisted fields of an order, used by stores to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct OrderParts {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    pub currency: Currency,
    pub payment_intent_id: String,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshot a paid cart. The order total is the cart's cached total, i.e.
    /// the amount the customer was charged. Lines whose product has left the
    /// catalog cannot be snapshotted and are left out; the payment still
    /// stands, so they do not block the order.
    pub fn from_paid_cart(
        cart: &Cart,
        products: &HashMap<Uuid, Product>,
        payment_intent_id: impl Into<String>,
        currency: Currency,
        paid_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::NoItems); }
        let items = cart
            .items()
            .iter()
            .filter_map(|line| {
                products.get(&line.product_id).map(|product| OrderItem {
                    product_id: product.id,
                    name: product.name.clone(),
                    quantity: line.quantity,
                    image: product.image.clone(),
                    price: product.price,
                })
            })
            .collect();
        Ok(Self {
            id: Uuid::now_v7(),
            user_id: cart.user_id(),
            items,
            total_price: cart.total(),
            currency,
            payment_intent_id: payment_intent_id.into(),
            is_paid: true,
            paid_at: Some(paid_at),
            is_delivered: false,
            delivered_at: None,
            created_at: paid_at,
            updated_at: paid_at,
        })
    }

    pub fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            user_id: parts.user_id,
            items: parts.items,
            total_price: parts.total_price,
            currency: parts.currency,
            payment_intent_id: parts.payment_intent_id,
            is_paid: parts.is_paid,
            paid_at: parts.paid_at,
            is_delivered: parts.is_delivered,
            delivered_at: parts.delivered_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total_price(&self) -> Decimal { self.total_price }
    pub fn currency(&self) -> &Currency { &self.currency }
    pub fn payment_intent_id(&self) -> &str { &self.payment_intent_id }
    pub fn is_paid(&self) -> bool { self.is_paid }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.paid_at }
    pub fn is_delivered(&self) -> bool { self.is_delivered }
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> { self.delivered_at }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Marking delivered (again) stamps `delivered_at`, never earlier than
    /// `created_at`. A delivered order cannot go back to undelivered.
    pub fn set_delivered(&mut self, delivered: bool, now: DateTime<Utc>) -> Result<(), OrderError> {
        match (delivered, self.is_delivered) {
            (true, _) => {
                self.is_delivered = true;
                self.delivered_at = Some(now.max(self.created_at));
            }
            (false, true) => return Err(OrderError::AlreadyDelivered(self.id)),
            (false, false) => return Ok(()),
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot create an order without items")]
    NoItems,
    #[error("order {0} is already delivered and cannot be reverted")]
    AlreadyDelivered(Uuid),
}
