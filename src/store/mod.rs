//! # Persistence
//!
//! One trait per aggregate. Two implementations exist:
//!
//! - [`memory::MemoryStore`] keeps everything in process memory. It is used
//!   when `DATABASE_URL` is unset and by the test suites.
//! - [`crate::db::PgStore`] persists to PostgreSQL through sqlx.
//!
//! Cart writes are versioned: [`CartStore::save`] only succeeds when the
//! stored version still matches the one the cart was loaded with, so two
//! writers racing on the same cart cannot silently lose an update.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Session;
use crate::domain::aggregates::{Cart, Order, Product, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or version check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be mapped back into the domain.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError>;
    async fn insert(&self, product: &Product) -> Result<(), StoreError>;
    /// Returns `false` when the product does not exist.
    async fn update(&self, product: &Product) -> Result<bool, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Atomically decrement stock if at least `quantity` is available.
    /// Returns `false` (and changes nothing) otherwise.
    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Cart>, StoreError>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;
    /// Insert (version 0) or update (version n) the cart and return it with
    /// its new version. Fails with [`StoreError::Conflict`] when the stored
    /// version moved on, or when a second cart is inserted for the same user.
    async fn save(&self, cart: &Cart) -> Result<Cart, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when an order already exists for
    /// the same payment intent.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StoreError>;
    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;
    /// Newest first.
    async fn list_all(&self) -> Result<Vec<Order>, StoreError>;
    async fn update(&self, order: &Order) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] on a duplicate email.
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn update(&self, user: &User) -> Result<bool, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> Result<(), StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<Session>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
    /// Remove every session expired at `now`; returns how many went.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// The full set of stores the services are built from.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(memory::MemoryStore::new()))
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_backend(Arc::new(crate::db::PgStore::new(pool)))
    }

    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ProductStore + CartStore + OrderStore + UserStore + SessionStore + 'static,
    {
        Self {
            products: backend.clone(),
            carts: backend.clone(),
            orders: backend.clone(),
            users: backend.clone(),
            sessions: backend,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
