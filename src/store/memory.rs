//! In-memory stores.
//!
//! Every table is a `parking_lot::RwLock` over a `HashMap`. Locks are never
//! held across an `.await`, so a synchronous lock is enough; each method
//! takes the lock once, which makes the conditional writes (versioned cart
//! save, stock decrement, unique checks) atomic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{CartStore, OrderStore, ProductStore, SessionStore, StoreError, UserStore};
use crate::auth::Session;
use crate::domain::aggregates::{Cart, Order, Product, User};

/// Thread-safe, cloneable map keyed by id.
#[derive(Debug)]
struct Table<T> {
    rows: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl<T: Clone> Table<T> {
    fn get(&self, id: &Uuid) -> Option<T> {
        self.rows.read().get(id).cloned()
    }

    fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.read().values().find(|row| pred(row)).cloned()
    }

    fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.read().values().filter(|row| pred(row)).cloned().collect()
    }

    fn replace(&self, id: Uuid, row: T) -> bool {
        match self.rows.write().get_mut(&id) {
            Some(slot) => {
                *slot = row;
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: &Uuid) -> bool {
        self.rows.write().remove(id).is_some()
    }
}

/// All aggregates in process memory. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: Table<Product>,
    carts: Table<Cart>,
    orders: Table<Order>,
    users: Table<User>,
    sessions: Table<Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
    orders
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let mut products = self.products.filter(|_| true);
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.products.get(&id))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        Ok(self.products.filter(|p| ids.contains(&p.id)))
    }

    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        let mut rows = self.products.rows.write();
        if rows.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        rows.insert(product.id, product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<bool, StoreError> {
        Ok(self.products.replace(product.id, product.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.products.remove(&id))
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, StoreError> {
        let mut rows = self.products.rows.write();
        match rows.get_mut(&id) {
            Some(product) => Ok(product.remove_stock(quantity).is_ok()),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Cart>, StoreError> {
        Ok(self.carts.get(&id))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        Ok(self.carts.find(|c| c.user_id() == user_id))
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, StoreError> {
        let mut rows = self.carts.rows.write();
        let stored_version = rows.get(&cart.id()).map(Cart::version);
        match stored_version {
            None if cart.version() == 0 => {
                if rows.values().any(|c| c.user_id() == cart.user_id()) {
                    return Err(StoreError::Conflict(format!("user {} already has a cart", cart.user_id())));
                }
            }
            Some(v) if v == cart.version() => {}
            _ => {
                return Err(StoreError::Conflict(format!("cart {} was modified concurrently", cart.id())));
            }
        }
        let saved = cart.clone().saved_as(cart.version() + 1);
        rows.insert(saved.id(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut rows = self.orders.rows.write();
        if rows.values().any(|o| o.payment_intent_id() == order.payment_intent_id()) {
            return Err(StoreError::Conflict(format!(
                "an order already exists for payment intent {}",
                order.payment_intent_id()
            )));
        }
        rows.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id))
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.find(|o| o.payment_intent_id() == payment_intent_id))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        Ok(newest_first(self.orders.filter(|o| o.user_id() == user_id)))
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        Ok(newest_first(self.orders.filter(|_| true)))
    }

    async fn update(&self, order: &Order) -> Result<bool, StoreError> {
        Ok(self.orders.replace(order.id(), order.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut rows = self.users.rows.write();
        if rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        rows.insert(user.id, user.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.find(|u| u.email == email))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        Ok(self.users.filter(|u| ids.contains(&u.id)))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users = self.users.filter(|_| true);
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<bool, StoreError> {
        let mut rows = self.users.rows.write();
        if rows.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        match rows.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        // Carts and sessions go with the user, mirroring the ON DELETE CASCADE in Postgres.
        self.carts.rows.write().retain(|_, c| c.user_id() != id);
        self.sessions.rows.write().retain(|_, s| s.user_id != id);
        Ok(self.users.remove(&id))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.rows.write().insert(session.id, session.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(&id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(&id))
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut rows = self.sessions.rows.write();
        let before = rows.len();
        rows.retain(|_, s| s.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut rows = self.sessions.rows.write();
        let before = rows.len();
        rows.retain(|_, s| !s.is_expired(now));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::NewProduct;
    use rust_decimal::Decimal;

    fn product(stock: u32) -> Product {
        Product::create(NewProduct { name: "Nike Air Max".into(), price: Decimal::new(12999, 2), count_in_stock: stock, ..NewProduct::default() }, None).unwrap()
    }

    #[tokio::test]
    async fn cart_save_bumps_version_and_rejects_stale_writes() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let saved = store.save(&Cart::for_user(user)).await.unwrap();
        assert_eq!(saved.version(), 1);

        let mut first = saved.clone();
        let mut second = saved;
        first.add_item(Uuid::now_v7(), 1);
        second.add_item(Uuid::now_v7(), 2);
        assert_eq!(store.save(&first).await.unwrap().version(), 2);
        assert!(matches!(store.save(&second).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn one_cart_per_user() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        store.save(&Cart::for_user(user)).await.unwrap();
        assert!(matches!(store.save(&Cart::for_user(user)).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn decrement_stock_has_a_floor() {
        let store = MemoryStore::new();
        let p = product(3);
        ProductStore::insert(&store, &p).await.unwrap();
        assert!(store.decrement_stock(p.id, 2).await.unwrap());
        assert!(!store.decrement_stock(p.id, 2).await.unwrap());
        let stored = ProductStore::find(&store, p.id).await.unwrap().unwrap();
        assert_eq!(stored.count_in_stock, 1);
        assert!(!store.decrement_stock(Uuid::now_v7(), 1).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        UserStore::insert(&store, &User::create("A", "a@example.com", "h".into(), false)).await.unwrap();
        let dup = User::create("B", "A@example.com", "h".into(), false);
        assert!(matches!(UserStore::insert(&store, &dup).await, Err(StoreError::Conflict(_))));
    }
}
