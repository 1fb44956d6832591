//! Stripe Checkout Integration
//!
//! Hosted checkout for one-time credit pack purchases.

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CustomerId,
};

use super::{CheckoutSessionRequest, CreatedSession, EnrichedSession, PaymentProcessor};
use crate::error::{PaymentError, Result};
use crate::signature::DEFAULT_TOLERANCE_SECS;

/// Stripe client wrapper
pub struct StripeProcessor {
    client: Client,
    tolerance_secs: i64,
}

impl StripeProcessor {
    /// Create a new Stripe processor
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Override the webhook timestamp tolerance
    pub fn with_webhook_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession> {
        let customer = request.customer_id.parse::<CustomerId>().map_err(|e| {
            PaymentError::SessionCreationFailed(format!("invalid customer id: {e}"))
        })?;

        let mut params = CreateCheckoutSession::new();
        params.customer = Some(customer);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&request.success_url);
        params.cancel_url = request.cancel_url.as_deref();
        params.client_reference_id = Some(&request.client_reference_id);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(request.price_id.clone()),
            quantity: Some(request.quantity),
            ..Default::default()
        }]);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::SessionCreationFailed(e.to_string()))?;

        Ok(CreatedSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<EnrichedSession> {
        let id = session_id.parse::<CheckoutSessionId>().map_err(|e| {
            PaymentError::MalformedSettlement(format!("invalid session id {session_id}: {e}"))
        })?;

        let session = CheckoutSession::retrieve(&self.client, &id, &["line_items"])
            .await
            .map_err(|e| PaymentError::EnrichmentFailed(e.to_string()))?;

        let price_id = session
            .line_items
            .as_ref()
            .and_then(|items| items.data.first())
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.to_string());

        Ok(EnrichedSession {
            id: session.id.to_string(),
            price_id,
            customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
            client_reference_id: session.client_reference_id.clone(),
        })
    }

    fn webhook_tolerance_secs(&self) -> i64 {
        self.tolerance_secs
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}
