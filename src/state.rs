//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::payments::PaymentGateway;
use crate::publisher::EventPublisher;
use crate::services::{AccountService, CartLocks, CartService, CatalogService, CheckoutService, OrderService};
use crate::store::Stores;

/// Handed to every handler. Cloning is cheap; all services share the same
/// stores, gateway, publisher and cart locks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub accounts: AccountService,
    pub db_pool: Option<sqlx::PgPool>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        events: EventPublisher,
        db_pool: Option<sqlx::PgPool>,
    ) -> Self {
        let locks = CartLocks::new();
        Self {
            catalog: CatalogService::new(stores.products.clone()),
            carts: CartService::new(stores.carts.clone(), stores.products.clone(), locks.clone(), events.clone()),
            checkout: CheckoutService::new(
                stores.carts.clone(),
                stores.products.clone(),
                stores.orders.clone(),
                gateway,
                locks,
                events.clone(),
                config.currency.clone(),
            ),
            orders: OrderService::new(stores.orders.clone(), stores.users.clone(), events),
            accounts: AccountService::new(stores.users, stores.sessions, config.session_ttl()),
            config: Arc::new(config),
            db_pool,
        }
    }

    /// In-memory stores, auto-confirming payments, no event bus.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Stores::in_memory(),
            Arc::new(crate::payments::InMemoryGateway::new(true)),
            EventPublisher::disabled(),
            None,
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("db_pool", &self.db_pool.is_some())
            .finish_non_exhaustive()
    }
}
