//! Application State

use axum::http::HeaderName;
use std::path::Path;
use std::sync::Arc;

use thumbgo_payments::{
    CheckoutInitiator, CreditStore, MemoryCreditStore, PackageCatalog, PaymentProcessor,
    SettlementHandler, UserAccount,
};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Credit packs on sale
    pub catalog: Arc<PackageCatalog>,

    /// User records and balances
    pub store: Arc<dyn CreditStore>,

    /// Checkout initiator (None if Stripe is not configured)
    pub checkout: Option<Arc<CheckoutInitiator>>,

    /// Webhook settlement (None if Stripe is not configured)
    pub settlement: Option<Arc<SettlementHandler>>,

    /// Header carrying the authenticated user id
    pub user_header: HeaderName,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn CreditStore>,
        processor: Option<Arc<dyn PaymentProcessor>>,
    ) -> Self {
        let catalog = Arc::new(config.catalog.clone());

        let (checkout, settlement) = match processor {
            Some(processor) => {
                let checkout = CheckoutInitiator::new(
                    processor.clone(),
                    store.clone(),
                    catalog.clone(),
                    config.checkout_urls.clone(),
                )
                .with_timeout(config.processor_timeout);

                let settlement = SettlementHandler::new(
                    processor,
                    store.clone(),
                    catalog.clone(),
                    config.webhook_secret.clone(),
                )
                .with_timeout(config.processor_timeout);

                (Some(Arc::new(checkout)), Some(Arc::new(settlement)))
            }
            None => (None, None),
        };

        Self {
            catalog,
            store,
            checkout,
            settlement,
            user_header: config.user_header.clone(),
        }
    }

    pub fn payments_enabled(&self) -> bool {
        self.checkout.is_some()
    }
}

/// Parse a JSON array of accounts into a store
pub fn parse_seed(json: &str) -> anyhow::Result<MemoryCreditStore> {
    let accounts: Vec<UserAccount> = serde_json::from_str(json)?;
    Ok(MemoryCreditStore::from_accounts(accounts)?)
}

/// Build the in-memory store, seeded from `path` when given
pub fn load_store(path: Option<&Path>) -> anyhow::Result<MemoryCreditStore> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
            parse_seed(&json)
        }
        None => Ok(MemoryCreditStore::new()),
    }
}
