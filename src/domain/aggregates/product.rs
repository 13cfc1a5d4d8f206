//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub count_in_stock: u32,
    pub category: String,
    pub brand: String,
    pub image: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog fields supplied when a product is created.
#[derive(Clone, Debug, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub count_in_stock: u32,
    pub category: String,
    pub brand: String,
    pub image: String,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub count_in_stock: Option<u32>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image: Option<String>,
}

impl Product {
    pub fn create(input: NewProduct, owner: Option<Uuid>) -> Result<Self, ProductError> {
        validate_name(&input.name)?;
        validate_price(input.price)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            count_in_stock: input.count_in_stock,
            category: input.category,
            brand: input.brand,
            image: input.image,
            user_id: owner,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gate a cart addition against the current stock count. Nothing is reserved.
    pub fn ensure_available(&self, requested: u32) -> Result<(), ProductError> {
        if requested > self.count_in_stock {
            return Err(ProductError::InsufficientStock {
                product_id: self.id,
                requested,
                available: self.count_in_stock,
            });
        }
        Ok(())
    }

    pub fn apply(&mut self, update: ProductUpdate) -> Result<(), ProductError> {
        if let Some(name) = update.name {
            validate_name(&name)?;
            self.name = name.trim().to_string();
        }
        if let Some(price) = update.price {
            validate_price(price)?;
            self.price = price;
        }
        if let Some(description) = update.description { self.description = description; }
        if let Some(count) = update.count_in_stock { self.count_in_stock = count; }
        if let Some(category) = update.category { self.category = category; }
        if let Some(brand) = update.brand { self.brand = brand; }
        if let Some(image) = update.image { self.image = image; }
        self.touch();
        Ok(())
    }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.count_in_stock = self.count_in_stock.checked_sub(qty).ok_or(ProductError::InsufficientStock {
            product_id: self.id,
            requested: qty,
            available: self.count_in_stock,
        })?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn validate_name(name: &str) -> Result<(), ProductError> {
    if name.trim().is_empty() { return Err(ProductError::MissingName); }
    Ok(())
}

/// Prices are whole cents: the amount charged is the total in minor units.
const PRICE_SCALE: u32 = 2;

fn validate_price(price: Decimal) -> Result<(), ProductError> {
    if price.is_sign_negative() && !price.is_zero() { return Err(ProductError::NegativePrice(price)); }
    if price.normalize().scale() > PRICE_SCALE { return Err(ProductError::TooPrecise(price)); }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductError {
    #[error("product name must not be empty")]
    MissingName,
    #[error("price must not be negative (got {0})")]
    NegativePrice(Decimal),
    #[error("price must have at most two decimal places (got {0})")]
    TooPrecise(Decimal),
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },
}
