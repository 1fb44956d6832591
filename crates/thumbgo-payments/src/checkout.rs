//! Checkout Initiation
//!
//! Turns "user X wants pack Y" into a Stripe-hosted checkout URL. Nothing
//! is written to storage here; credits only move on settlement.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::account::{CreditStore, UserId};
use crate::catalog::PackageCatalog;
use crate::error::{PaymentError, Result};
use crate::processor::{CheckoutSessionRequest, PaymentProcessor};

/// Default bound on the processor call
pub const DEFAULT_PROCESSOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to send the browser once checkout is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    /// Stripe session ID
    pub session_id: String,

    /// Processor-hosted URL to redirect the user to
    pub url: String,
}

/// Redirect targets passed to Stripe
#[derive(Clone, Debug)]
pub struct CheckoutUrls {
    /// Absolute URL after successful payment
    pub success_url: String,

    /// Absolute URL if checkout is abandoned
    pub cancel_url: Option<String>,
}

impl CheckoutUrls {
    pub fn new(success_url: impl Into<String>) -> Result<Self> {
        let success_url = success_url.into();
        ensure_absolute(&success_url)?;
        Ok(Self {
            success_url,
            cancel_url: None,
        })
    }

    pub fn with_cancel_url(mut self, cancel_url: impl Into<String>) -> Result<Self> {
        let cancel_url = cancel_url.into();
        ensure_absolute(&cancel_url)?;
        self.cancel_url = Some(cancel_url);
        Ok(self)
    }
}

/// Stripe redirects from its own domain, so relative URLs would break
fn ensure_absolute(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| PaymentError::Config(format!("redirect URL must be absolute: {url}")))?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(PaymentError::Config(format!("redirect URL has no host: {url}")));
    }
    Ok(())
}

/// Creates checkout sessions for credit packs
pub struct CheckoutInitiator {
    processor: Arc<dyn PaymentProcessor>,
    store: Arc<dyn CreditStore>,
    catalog: Arc<PackageCatalog>,
    urls: CheckoutUrls,
    timeout: Duration,
}

impl CheckoutInitiator {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn CreditStore>,
        catalog: Arc<PackageCatalog>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            processor,
            store,
            catalog,
            urls,
            timeout: DEFAULT_PROCESSOR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start a checkout for `price_id` on behalf of `current_user`.
    ///
    /// Validation happens before any processor call: unknown pack, then
    /// missing session, then missing Stripe customer.
    pub async fn initiate(
        &self,
        price_id: &str,
        current_user: Option<&UserId>,
    ) -> Result<CheckoutRedirect> {
        if !self.catalog.contains(price_id) {
            return Err(PaymentError::InvalidPackage(price_id.to_string()));
        }

        let user_id = current_user.ok_or(PaymentError::Unauthenticated)?;

        let customer_id = self
            .store
            .find_user_by_id(user_id)
            .await?
            .and_then(|user| user.payment_customer_id)
            .ok_or_else(|| PaymentError::NoPaymentProfile(user_id.clone()))?;

        let request = CheckoutSessionRequest {
            price_id: price_id.to_string(),
            quantity: 1,
            customer_id,
            success_url: self.urls.success_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
            client_reference_id: user_id.to_string(),
        };

        let create = self.processor.create_checkout_session(&request);
        let session = tokio::time::timeout(self.timeout, create)
            .await
            .map_err(|_| {
                PaymentError::SessionCreationFailed(format!(
                    "{} did not answer within {:?}",
                    self.processor.name(),
                    self.timeout
                ))
            })?
            .map_err(|e| match e {
                PaymentError::SessionCreationFailed(_) => e,
                other => PaymentError::SessionCreationFailed(other.to_string()),
            })?;

        let url = session
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PaymentError::SessionCreationFailed("No checkout URL returned".into()))?;

        tracing::info!(
            user_id = %user_id,
            price_id = %price_id,
            session_id = %session.id,
            "Created checkout session"
        );

        Ok(CheckoutRedirect {
            session_id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryCreditStore, UserAccount};
    use crate::processor::MockProcessor;

    fn catalog() -> Arc<PackageCatalog> {
        Arc::new(PackageCatalog::parse("price_10:10,price_25:25,price_100:100").unwrap())
    }

    fn store() -> Arc<MemoryCreditStore> {
        Arc::new(
            MemoryCreditStore::from_accounts([
                UserAccount::new("user_1").with_customer("cus_1"),
                UserAccount::new("user_2"),
            ])
            .unwrap(),
        )
    }

    fn initiator(processor: Arc<MockProcessor>) -> CheckoutInitiator {
        let urls = CheckoutUrls::new("https://www.thumbgo.co/dashboard").unwrap();
        CheckoutInitiator::new(processor, store(), catalog(), urls)
    }

    #[tokio::test]
    async fn test_checkout_returns_processor_url() {
        let processor = Arc::new(MockProcessor::new());
        let redirect = initiator(processor.clone())
            .initiate("price_10", Some(&"user_1".into()))
            .await
            .unwrap();

        assert!(redirect.url.starts_with("https://checkout.stripe.com/"));

        let requests = processor.checkout_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].price_id, "price_10");
        assert_eq!(requests[0].quantity, 1);
        assert_eq!(requests[0].customer_id, "cus_1");
        assert_eq!(requests[0].client_reference_id, "user_1");
        assert_eq!(requests[0].success_url, "https://www.thumbgo.co/dashboard");
    }

    #[tokio::test]
    async fn test_unknown_package_makes_no_call() {
        let processor = Arc::new(MockProcessor::new());
        let err = initiator(processor.clone())
            .initiate("price_bogus", Some(&"user_1".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvalidPackage(_)));
        assert_eq!(processor.checkout_calls(), 0);
    }

    #[tokio::test]
    async fn test_package_checked_before_session() {
        let processor = Arc::new(MockProcessor::new());
        let err = initiator(processor).initiate("price_bogus", None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPackage(_)));
    }

    #[tokio::test]
    async fn test_unauthenticated() {
        let processor = Arc::new(MockProcessor::new());
        let err = initiator(processor.clone()).initiate("price_10", None).await.unwrap_err();
        assert!(matches!(err, PaymentError::Unauthenticated));
        assert_eq!(processor.checkout_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_payment_profile() {
        let processor = Arc::new(MockProcessor::new());
        let checkout = initiator(processor.clone());

        let err = checkout.initiate("price_10", Some(&"user_2".into())).await.unwrap_err();
        assert!(matches!(err, PaymentError::NoPaymentProfile(_)));

        let err = checkout.initiate("price_10", Some(&"ghost".into())).await.unwrap_err();
        assert!(matches!(err, PaymentError::NoPaymentProfile(_)));

        assert_eq!(processor.checkout_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_url_fails() {
        let processor = Arc::new(MockProcessor::new().without_checkout_url());
        let err = initiator(processor)
            .initiate("price_25", Some(&"user_1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::SessionCreationFailed(_)));
    }

    #[tokio::test]
    async fn test_processor_failure() {
        let processor = Arc::new(MockProcessor::new().failing_checkout());
        let err = initiator(processor)
            .initiate("price_100", Some(&"user_1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::SessionCreationFailed(_)));
    }

    #[test]
    fn test_redirect_urls_must_be_absolute() {
        assert!(CheckoutUrls::new("/dashboard").is_err());
        assert!(CheckoutUrls::new("https://").is_err());
        assert!(CheckoutUrls::new("https://www.thumbgo.co/dashboard").is_ok());
        assert!(CheckoutUrls::new("https://www.thumbgo.co/dashboard")
            .unwrap()
            .with_cancel_url("pricing")
            .is_err());
    }
}
