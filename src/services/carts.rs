//! Cart service.
//!
//! Every mutation runs under the user's [`CartLocks`] entry, recomputes the
//! cached total from live product prices and saves the cart with a version
//! check.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::locks::CartLocks;
use crate::domain::aggregates::{Cart, CartError, Product, ProductError};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::publisher::EventPublisher;
use crate::store::{CartStore, ProductStore, StoreError};

#[derive(Debug, Error)]
pub enum CartsError {
    #[error("product {0} not found")]
    ProductNotFound(Uuid),

    #[error("cart not found")]
    CartNotFound,

    #[error(transparent)]
    Item(#[from] CartError),

    #[error(transparent)]
    Stock(#[from] ProductError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A cart with its line items resolved to full product data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartView {
    pub fn empty() -> Self {
        Self { items: vec![], total: Decimal::ZERO }
    }

    fn build(cart: &Cart, products: &HashMap<Uuid, Product>) -> Self {
        let items = cart
            .items()
            .iter()
            .filter_map(|line| products.get(&line.product_id).map(|p| CartLine { product: p.clone(), quantity: line.quantity }))
            .collect();
        Self { items, total: cart.total() }
    }
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductStore>,
    locks: CartLocks,
    events: EventPublisher,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, products: Arc<dyn ProductStore>, locks: CartLocks, events: EventPublisher) -> Self {
        Self { carts, products, locks, events }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<CartView, CartsError> {
        let Some(cart) = self.carts.find_by_user(user_id).await? else {
            return Ok(CartView::empty());
        };
        let products = self.resolve(&cart).await?;
        Ok(CartView::build(&cart, &products))
    }

    /// Stock is checked against the requested quantity only; nothing is reserved.
    pub async fn add_item(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> Result<CartView, CartsError> {
        let _guard = self.locks.lock(user_id).await;

        let product = self.products.find(product_id).await?.ok_or(CartsError::ProductNotFound(product_id))?;
        product.ensure_available(quantity)?;

        let mut cart = match self.carts.find_by_user(user_id).await? {
            Some(cart) => cart,
            None => Cart::for_user(user_id),
        };
        cart.add_item(product_id, quantity);
        self.recompute_and_save(cart).await
    }

    /// Sets the quantity directly, without a stock bound.
    pub async fn update_item(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> Result<CartView, CartsError> {
        let _guard = self.locks.lock(user_id).await;

        let mut cart = self.carts.find_by_user(user_id).await?.ok_or(CartsError::CartNotFound)?;
        cart.set_quantity(product_id, quantity)?;
        self.recompute_and_save(cart).await
    }

    /// Removing a product that is not in the cart succeeds without changes.
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<CartView, CartsError> {
        let _guard = self.locks.lock(user_id).await;

        let mut cart = self.carts.find_by_user(user_id).await?.ok_or(CartsError::CartNotFound)?;
        if !cart.remove_item(product_id) {
            tracing::debug!(%user_id, %product_id, "product not in cart, nothing removed");
        }
        self.recompute_and_save(cart).await
    }

    async fn resolve(&self, cart: &Cart) -> Result<HashMap<Uuid, Product>, CartsError> {
        Ok(resolve_products(self.products.as_ref(), cart).await?)
    }

    async fn recompute_and_save(&self, mut cart: Cart) -> Result<CartView, CartsError> {
        let products = reprice(self.products.as_ref(), &mut cart).await?;

        let saved = self.carts.save(&cart).await?;
        tracing::info!(
            cart_id = %saved.id(),
            user_id = %saved.user_id(),
            items = saved.items().len(),
            total = %saved.total(),
            version = saved.version(),
            "cart saved"
        );
        self.events
            .publish(DomainEvent::Cart(CartEvent::Updated {
                cart_id: saved.id(),
                user_id: saved.user_id(),
                total: saved.total(),
                items: saved.items().len(),
            }))
            .await;
        Ok(CartView::build(&saved, &products))
    }
}

async fn resolve_products(products: &dyn ProductStore, cart: &Cart) -> Result<HashMap<Uuid, Product>, StoreError> {
    let found = products.find_many(&cart.product_ids()).await?;
    Ok(found.into_iter().map(|p| (p.id, p)).collect())
}

/// Reprice `cart` from the live catalog, dropping lines whose product is gone.
/// Returns the products the remaining lines resolve to. Nothing is saved.
pub(super) async fn reprice(products: &dyn ProductStore, cart: &mut Cart) -> Result<HashMap<Uuid, Product>, StoreError> {
    let resolved = resolve_products(products, cart).await?;
    let prices: HashMap<Uuid, Decimal> = resolved.iter().map(|(id, p)| (*id, p.price)).collect();
    for dropped in cart.recalculate(&prices) {
        tracing::warn!(cart_id = %cart.id(), product_id = %dropped, "dropping cart line for deleted product");
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewProduct, ProductUpdate};
    use crate::store::Stores;

    struct Fixture {
        stores: Stores,
        carts: CartService,
    }

    fn fixture() -> Fixture {
        let stores = Stores::in_memory();
        let carts = CartService::new(stores.carts.clone(), stores.products.clone(), CartLocks::new(), EventPublisher::disabled());
        Fixture { stores, carts }
    }

    async fn product(stores: &Stores, price: Decimal, stock: u32) -> Product {
        let p = Product::create(NewProduct { name: "Item".into(), price, count_in_stock: stock, ..NewProduct::default() }, None).unwrap();
        stores.products.insert(&p).await.unwrap();
        p
    }

    #[tokio::test]
    async fn get_without_cart_is_the_empty_shape() {
        let f = fixture();
        let view = f.carts.get(Uuid::now_v7()).await.unwrap();
        assert_eq!(view, CartView::empty());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json, serde_json::json!({ "items": [], "total": 0.0 }));
    }

    #[tokio::test]
    async fn adding_twice_sums_quantities() {
        let f = fixture();
        let user = Uuid::now_v7();
        let a = product(&f.stores, Decimal::new(1000, 2), 5).await;

        f.carts.add_item(user, a.id, 2).await.unwrap();
        let view = f.carts.add_item(user, a.id, 2).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 4);
        assert_eq!(view.total, Decimal::new(4000, 2));
    }

    #[tokio::test]
    async fn over_stock_add_fails_and_leaves_cart_unchanged() {
        let f = fixture();
        let user = Uuid::now_v7();
        let a = product(&f.stores, Decimal::new(500, 2), 3).await;
        f.carts.add_item(user, a.id, 1).await.unwrap();

        let err = f.carts.add_item(user, a.id, 4).await.unwrap_err();
        assert!(matches!(err, CartsError::Stock(ProductError::InsufficientStock { requested: 4, available: 3, .. })));

        let view = f.carts.get(user).await.unwrap();
        assert_eq!(view.items[0].quantity, 1);
        assert_eq!(view.total, Decimal::new(500, 2));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let f = fixture();
        let missing = Uuid::now_v7();
        assert!(matches!(f.carts.add_item(Uuid::now_v7(), missing, 1).await, Err(CartsError::ProductNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn total_follows_prices_at_mutation_time() {
        let f = fixture();
        let user = Uuid::now_v7();
        let a = product(&f.stores, Decimal::new(1000, 2), 10).await;
        let b = product(&f.stores, Decimal::new(250, 2), 10).await;
        f.carts.add_item(user, a.id, 1).await.unwrap();
        f.carts.add_item(user, b.id, 2).await.unwrap();

        let mut repriced = a.clone();
        repriced.apply(ProductUpdate { price: Some(Decimal::new(1500, 2)), ..ProductUpdate::default() }).unwrap();
        f.stores.products.update(&repriced).await.unwrap();

        // Cached total is stale until the next mutation.
        assert_eq!(f.carts.get(user).await.unwrap().total, Decimal::new(1500, 2));

        let view = f.carts.update_item(user, b.id, 3).await.unwrap();
        assert_eq!(view.total, Decimal::new(2250, 2));
    }

    #[tokio::test]
    async fn update_quantity_requires_cart_and_line() {
        let f = fixture();
        let user = Uuid::now_v7();
        let a = product(&f.stores, Decimal::ONE, 1).await;
        assert!(matches!(f.carts.update_item(user, a.id, 2).await, Err(CartsError::CartNotFound)));

        f.carts.add_item(user, a.id, 1).await.unwrap();
        assert!(matches!(f.carts.update_item(user, Uuid::now_v7(), 2).await, Err(CartsError::Item(CartError::ItemNotFound(_)))));

        // No stock bound on a direct quantity update.
        let view = f.carts.update_item(user, a.id, 9).await.unwrap();
        assert_eq!(view.items[0].quantity, 9);
        assert_eq!(view.total, Decimal::new(9, 0));
    }

    #[tokio::test]
    async fn removing_absent_product_is_a_no_op() {
        let f = fixture();
        let user = Uuid::now_v7();
        let a = product(&f.stores, Decimal::new(300, 2), 5).await;
        assert!(matches!(f.carts.remove_item(user, a.id).await, Err(CartsError::CartNotFound)));

        f.carts.add_item(user, a.id, 2).await.unwrap();
        let view = f.carts.remove_item(user, Uuid::now_v7()).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total, Decimal::new(600, 2));

        let view = f.carts.remove_item(user, a.id).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn deleted_products_are_dropped_on_next_mutation() {
        let f = fixture();
        let user = Uuid::now_v7();
        let a = product(&f.stores, Decimal::new(100, 2), 5).await;
        let b = product(&f.stores, Decimal::new(200, 2), 5).await;
        f.carts.add_item(user, a.id, 1).await.unwrap();
        f.carts.add_item(user, b.id, 1).await.unwrap();
        f.stores.products.delete(a.id).await.unwrap();

        let view = f.carts.update_item(user, b.id, 2).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].product.id, b.id);
        assert_eq!(view.total, Decimal::new(400, 2));
    }

    #[tokio::test]
    async fn concurrent_adds_for_one_user_are_all_applied() {
        let f = fixture();
        let user = Uuid::now_v7();
        let product_id = product(&f.stores, Decimal::ONE, 100).await.id;

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let carts = f.carts.clone();
                tokio::spawn(async move { carts.add_item(user, product_id, 1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let view = f.carts.get(user).await.unwrap();
        assert_eq!(view.items[0].quantity, 10);
        assert_eq!(view.total, Decimal::new(10, 0));
    }
}
