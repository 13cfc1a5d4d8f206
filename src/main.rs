//! Storefront API server

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::AppConfig;
use storefront::payments::{HttpPaymentGateway, InMemoryGateway, PaymentGateway};
use storefront::publisher::EventPublisher;
use storefront::store::Stores;
use storefront::{app, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("loading configuration")?;

    let (stores, pool) = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.database_max_connections)
                .await
                .context("connecting to the database")?;
            (Stores::postgres(pool.clone()), Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            (Stores::in_memory(), None)
        }
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.payment_api_key {
        Some(key) => Arc::new(
            HttpPaymentGateway::new(&config.payment_api_base, key).context("building the payment client")?,
        ),
        None => {
            tracing::warn!("PAYMENT_API_KEY not set, payments are confirmed in memory");
            Arc::new(InMemoryGateway::new(true))
        }
    };

    let events = match &config.nats_url {
        Some(url) => EventPublisher::connect(url).await,
        None => EventPublisher::disabled(),
    };

    let port = config.port;
    let admin = config.admin.clone();
    let state = AppState::new(config, stores, gateway, events, pool);

    if let Some(seed) = admin {
        state
            .accounts
            .ensure_admin(&seed.name, &seed.email, &seed.password)
            .await
            .context("seeding the administrator account")?;
    }

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "storefront listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
