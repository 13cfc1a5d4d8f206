//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
    Product(ProductEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    Updated { cart_id: Uuid, user_id: Uuid, #[serde(with = "rust_decimal::serde::float")] total: Decimal, items: usize },
    Cleared { cart_id: Uuid, user_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, #[serde(with = "rust_decimal::serde::float")] total: Decimal, payment_intent_id: String },
    Delivered { order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDecremented { product_id: Uuid, quantity: u32 },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Cart(CartEvent::Updated { .. }) => "storefront.cart.updated",
            Self::Cart(CartEvent::Cleared { .. }) => "storefront.cart.cleared",
            Self::Order(OrderEvent::Placed { .. }) => "storefront.order.placed",
            Self::Order(OrderEvent::Delivered { .. }) => "storefront.order.delivered",
            Self::Product(ProductEvent::StockDecremented { .. }) => "storefront.product.stock_decremented",
        }
    }
}
