//! Cart Aggregate

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::line_total;

/// One cart per user. `total` is a cache recomputed on every mutation from
/// live product prices; it does not follow later price changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Cart {
    id: Uuid,
    user_id: Uuid,
    items: Vec<CartItem>,
    total: Decimal,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

impl Cart {
    /// A fresh, unsaved cart (version 0).
    pub fn for_user(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, items: vec![], total: Decimal::ZERO, version: 0, created_at: now, updated_at: now }
    }

    /// Rebuild a cart from its persisted parts.
    pub fn from_parts(
        id: Uuid,
        user_id: Uuid,
        items: Vec<CartItem>,
        total: Decimal,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, user_id, items, total, version, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn total(&self) -> Decimal { self.total }
    pub fn version(&self) -> i64 { self.version }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn product_ids(&self) -> Vec<Uuid> { self.items.iter().map(|i| i.product_id).collect() }

    /// Sum into an existing line item, or append a new one.
    pub fn add_item(&mut self, product_id: Uuid, quantity: u32) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem { product_id, quantity });
        }
        self.touch();
    }

    pub fn set_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound(product_id))?;
        item.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Idempotent: returns whether a line item was actually removed.
    pub fn remove_item(&mut self, product_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.touch();
        self.items.len() != before
    }

    /// Recompute `total` from current prices. Line items whose product is
    /// missing from `prices` are dropped and their ids returned.
    pub fn recalculate(&mut self, prices: &HashMap<Uuid, Decimal>) -> Vec<Uuid> {
        let dropped: Vec<Uuid> = self.items.iter().map(|i| i.product_id).filter(|id| !prices.contains_key(id)).collect();
        self.items.retain(|i| prices.contains_key(&i.product_id));
        self.total = line_total(self.items.iter().filter_map(|i| prices.get(&i.product_id).map(|p| (*p, i.quantity))));
        self.touch();
        dropped
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total = Decimal::ZERO;
        self.touch();
    }

    /// Stores call this after a successful versioned write.
    pub fn saved_as(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    #[error("product {0} is not in the cart")]
    ItemNotFound(Uuid),
}
