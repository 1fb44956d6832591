//! Stripe Webhook Settlement
//!
//! Verifies Stripe notifications and credits the paying user. Each
//! notification runs verify -> enrich -> map -> credit in order, and the
//! ledger write is always the last step.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::account::{CreditStore, SettlementRecord, UserId};
use crate::catalog::PackageCatalog;
use crate::checkout::DEFAULT_PROCESSOR_TIMEOUT;
use crate::error::{PaymentError, Result};
use crate::processor::{EventKind, PaymentProcessor};

/// What happened to a notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Event type we do not act on
    Ignored { event_type: String },

    /// Credits were added
    Credited {
        user_id: UserId,
        session_id: String,
        credits_added: u64,
        new_total: u64,
    },

    /// Session was credited by an earlier delivery
    AlreadySettled { session_id: String, balance: u64 },
}

/// JSON acknowledgement returned to Stripe
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    pub received: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_added: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_total: Option<u64>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

impl From<&SettlementOutcome> for Acknowledgement {
    fn from(outcome: &SettlementOutcome) -> Self {
        match outcome {
            SettlementOutcome::Ignored { .. } => Self {
                received: true,
                credits_added: None,
                new_total: None,
                duplicate: false,
            },
            SettlementOutcome::Credited {
                credits_added,
                new_total,
                ..
            } => Self {
                received: true,
                credits_added: Some(*credits_added),
                new_total: Some(*new_total),
                duplicate: false,
            },
            SettlementOutcome::AlreadySettled { .. } => Self {
                received: true,
                credits_added: None,
                new_total: None,
                duplicate: true,
            },
        }
    }
}

/// Webhook handler
pub struct SettlementHandler {
    processor: Arc<dyn PaymentProcessor>,
    store: Arc<dyn CreditStore>,
    catalog: Arc<PackageCatalog>,
    webhook_secret: Option<String>,
    timeout: Duration,
}

impl SettlementHandler {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn CreditStore>,
        catalog: Arc<PackageCatalog>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            processor,
            store,
            catalog,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
            timeout: DEFAULT_PROCESSOR_TIMEOUT,
        }
    }

    /// Bound on the session re-fetch
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Process one raw notification.
    ///
    /// `payload` must be the request body exactly as received.
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<SettlementOutcome> {
        let (Some(signature), Some(secret)) = (signature, self.webhook_secret.as_deref()) else {
            tracing::warn!("Missing signature or webhook secret");
            return Err(PaymentError::AuthenticationFailed(
                "missing signature or webhook secret".into(),
            ));
        };

        let event = self
            .processor
            .verify_webhook(payload, signature, secret)
            .inspect_err(|e| tracing::warn!(error = %e, "Webhook verification failed"))?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.kind.as_str(),
            "Webhook event received"
        );

        if event.kind != EventKind::CheckoutCompleted {
            tracing::debug!(event_type = %event.kind.as_str(), "Unhandled webhook event");
            return Ok(SettlementOutcome::Ignored {
                event_type: event.kind.as_str().to_string(),
            });
        }

        let session_id = event.session_id.ok_or_else(|| {
            PaymentError::MalformedSettlement("checkout event without session id".into())
        })?;

        self.settle(&session_id).await
    }

    async fn settle(&self, session_id: &str) -> Result<SettlementOutcome> {
        let retrieve = self.processor.retrieve_session(session_id);
        let session = tokio::time::timeout(self.timeout, retrieve)
            .await
            .map_err(|_| {
                PaymentError::EnrichmentFailed(format!(
                    "session {session_id} not retrieved within {:?}",
                    self.timeout
                ))
            })?
            .inspect_err(|e| tracing::error!(session_id, error = %e, "Session retrieval failed"))?;

        let (Some(price_id), Some(customer_id)) = (session.price_id, session.customer_id) else {
            tracing::error!(session_id, "Missing priceId or customerId");
            return Err(PaymentError::MalformedSettlement(format!(
                "session {session_id} lacks price or customer"
            )));
        };

        let Some(credits) = self.catalog.credits_for(&price_id) else {
            tracing::error!(
                session_id,
                price_id = %price_id,
                "Settled price is not in the catalog"
            );
            return Err(PaymentError::UnknownPackage(price_id));
        };

        let user = self
            .store
            .find_user_by_customer_id(&customer_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| {
                tracing::error!(customer_id = %customer_id, "User not found for customer");
                PaymentError::UnknownCustomer(customer_id.clone())
            })?;

        if let Some(reference) = session.client_reference_id.as_deref() {
            if reference != user.id.as_str() {
                tracing::warn!(
                    session_id,
                    client_reference_id = reference,
                    user_id = %user.id,
                    "Client reference does not match customer owner"
                );
            }
        }

        let record = self
            .store
            .settle_session(&user.id, session_id, credits)
            .await
            .map_err(persistence)?;

        match record {
            SettlementRecord::Applied { new_total } => {
                tracing::info!(
                    user_id = %user.id,
                    session_id,
                    old_credits = user.credits,
                    added = credits,
                    new_credits = new_total,
                    "Credits updated"
                );
                Ok(SettlementOutcome::Credited {
                    user_id: user.id,
                    session_id: session_id.to_string(),
                    credits_added: credits,
                    new_total,
                })
            }
            SettlementRecord::Duplicate { balance } => {
                tracing::info!(user_id = %user.id, session_id, "Session already settled");
                Ok(SettlementOutcome::AlreadySettled {
                    session_id: session_id.to_string(),
                    balance,
                })
            }
        }
    }
}

fn persistence(e: PaymentError) -> PaymentError {
    tracing::error!(error = %e, "Ledger error");
    match e {
        PaymentError::PersistenceFailed(_) => e,
        other => PaymentError::PersistenceFailed(other.to_string()),
    }
}
