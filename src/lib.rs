//! Storefront API
//!
//! Backend for a single-vendor shop.
//!
//! ## Features
//! - Product catalog with admin management
//! - Per-user shopping carts priced from the live catalog
//! - Checkout through a Stripe-compatible payment processor
//! - Orders with immutable item snapshots and delivery tracking
//! - Accounts with Argon2 passwords and opaque bearer sessions

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod extractors;
pub mod payments;
pub mod publisher;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;

pub const SERVICE_NAME: &str = "storefront";

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if let Some(pool) = &state.db_pool {
        if let Err(err) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::error!(error = %err, "health check: database unreachable");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "service": SERVICE_NAME})),
            );
        }
    }
    (StatusCode::OK, Json(json!({"status": "healthy", "service": SERVICE_NAME})))
}
