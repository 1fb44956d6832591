//! thumbgo HTTP Server
//!
//! Axum-based server for buying credit packs through Stripe Checkout and
//! settling them from Stripe webhooks.

mod app;
mod config;
mod error;
mod extractors;
mod handlers;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumbgo_payments::{CreditStore, PaymentProcessor, StripeProcessor};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!("Loaded {} credit packs:", config.catalog.len());
    for package in config.catalog.packages() {
        tracing::info!("  {} -> {} credits", package.price_id, package.credits);
    }

    // Initialize storage
    let store = state::load_store(config.users_seed_path.as_deref())?;
    tracing::info!("Loaded {} user accounts", store.user_count().await);
    let store: Arc<dyn CreditStore> = Arc::new(store);

    // Initialize payments
    let processor = config.stripe_secret_key.as_deref().map(|key| {
        Arc::new(StripeProcessor::new(key).with_webhook_tolerance(config.webhook_tolerance_secs))
            as Arc<dyn PaymentProcessor>
    });

    if processor.is_some() {
        tracing::info!("Stripe configured");
    } else {
        tracing::warn!("Stripe not configured - payments disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set - every webhook will be rejected");
    }

    let state = AppState::new(&config, store, processor);
    let app = app::router(state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("thumbgo server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/packages   - List credit packs");
    tracing::info!("  GET  /api/credits    - Current balance");
    tracing::info!("  POST /api/checkout   - Start Stripe checkout");
    tracing::info!("  POST /webhook/stripe - Stripe webhook");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
