//! Server Configuration
//!
//! Everything is read from the environment once at startup.

use axum::http::HeaderName;
use std::path::PathBuf;
use std::time::Duration;

use thumbgo_payments::{CheckoutUrls, PackageCatalog, PaymentError};

const DEFAULT_SUCCESS_URL: &str = "https://www.thumbgo.co/dashboard";
const DEFAULT_USER_HEADER: &str = "x-user-id";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Payments(#[from] PaymentError),
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Stripe API key; payments are disabled without it
    pub stripe_secret_key: Option<String>,

    /// Webhook signing secret; every webhook is rejected without it
    pub webhook_secret: Option<String>,

    pub catalog: PackageCatalog,
    pub checkout_urls: CheckoutUrls,

    /// Bound on each Stripe API call
    pub processor_timeout: Duration,

    /// Bound on each HTTP request
    pub request_timeout: Duration,

    pub webhook_tolerance_secs: i64,

    /// Header carrying the authenticated user id from the auth proxy
    pub user_header: HeaderName,

    /// JSON file of accounts for the in-memory store
    pub users_seed_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());

        let catalog = PackageCatalog::from_lookup(&non_empty)?;

        let success_url =
            non_empty("CHECKOUT_SUCCESS_URL").unwrap_or_else(|| DEFAULT_SUCCESS_URL.into());
        let mut checkout_urls = CheckoutUrls::new(success_url)?;
        if let Some(cancel_url) = non_empty("CHECKOUT_CANCEL_URL") {
            checkout_urls = checkout_urls.with_cancel_url(cancel_url)?;
        }

        let processor_timeout = secs(&non_empty, "PROCESSOR_TIMEOUT_SECS", 10)?;
        let request_timeout = secs(&non_empty, "REQUEST_TIMEOUT_SECS", 30)?;

        let webhook_tolerance_secs = match non_empty("WEBHOOK_TOLERANCE_SECS") {
            Some(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("WEBHOOK_TOLERANCE_SECS"))?,
            None => thumbgo_payments::signature::DEFAULT_TOLERANCE_SECS,
        };

        let user_header = non_empty("AUTH_USER_HEADER")
            .unwrap_or_else(|| DEFAULT_USER_HEADER.into())
            .to_ascii_lowercase()
            .parse::<HeaderName>()
            .map_err(|_| ConfigError::Invalid("AUTH_USER_HEADER"))?;

        Ok(Self {
            bind_addr,
            stripe_secret_key: non_empty("STRIPE_SECRET_KEY"),
            webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
            catalog,
            checkout_urls,
            processor_timeout,
            request_timeout,
            webhook_tolerance_secs,
            user_header,
            users_seed_path: non_empty("USERS_SEED_PATH").map(PathBuf::from),
        })
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid(key)),
        None => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("CREDIT_PACKAGES", "price_10:10,price_25:25,price_100:100")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.catalog.len(), 3);
        assert_eq!(config.checkout_urls.success_url, DEFAULT_SUCCESS_URL);
        assert_eq!(config.processor_timeout, Duration::from_secs(10));
        assert_eq!(config.user_header.as_str(), "x-user-id");
        assert!(config.stripe_secret_key.is_none());
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn test_catalog_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Payments(_))));
    }

    #[test]
    fn test_blank_packages_fall_back_to_tiers() {
        let config = load(&[
            ("CREDIT_PACKAGES", "  "),
            ("STRIPE_10_PACK", "price_10"),
            ("STRIPE_25_PACK", "price_25"),
            ("STRIPE_100_PACK", "price_100"),
        ])
        .unwrap();
        assert_eq!(config.catalog.len(), 3);
        assert_eq!(config.catalog.credits_for("price_25"), Some(25));
    }

    #[test]
    fn test_relative_success_url_rejected() {
        let result = load(&[
            ("CREDIT_PACKAGES", "price_10:10"),
            ("CHECKOUT_SUCCESS_URL", "/dashboard"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let result = load(&[
            ("CREDIT_PACKAGES", "price_10:10"),
            ("PROCESSOR_TIMEOUT_SECS", "soon"),
        ]);
        assert!(matches!(result, Err(ConfigError::Invalid("PROCESSOR_TIMEOUT_SECS"))));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CREDIT_PACKAGES", "price_10:10"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
            ("AUTH_USER_HEADER", "X-Forwarded-User"),
            ("WEBHOOK_TOLERANCE_SECS", "60"),
            ("CHECKOUT_CANCEL_URL", "https://www.thumbgo.co/dashboard/pricing"),
        ])
        .unwrap();
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_1"));
        assert_eq!(config.user_header.as_str(), "x-forwarded-user");
        assert_eq!(config.webhook_tolerance_secs, 60);
        assert!(config.checkout_urls.cancel_url.is_some());
    }
}
