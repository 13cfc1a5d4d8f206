//! HTTP surface. Every router here is nested under `/api` by [`crate::app`].

pub mod auth;
pub mod cart;
pub mod orders;
pub mod payments;
pub mod products;

use axum::Router;

use crate::state::AppState;

/// Assemble the `/api` router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/products", products::router())
}
