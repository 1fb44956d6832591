//! Payment Processor Integration
//!
//! The payment processor is injected as a capability so checkout and
//! settlement can run against Stripe or a scripted double.

mod mock;
mod stripe_api;

pub use mock::MockProcessor;
pub use stripe_api::StripeProcessor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::signature;

/// Stripe event type that settles a purchase
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Parameters for a hosted checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    /// Price id of the single line item
    pub price_id: String,

    /// Line item quantity (always 1 for credit packs)
    pub quantity: u64,

    /// Stripe customer paying
    pub customer_id: String,

    /// Absolute URL Stripe sends the browser to after payment
    pub success_url: String,

    /// Absolute URL for abandoned checkouts
    #[serde(default)]
    pub cancel_url: Option<String>,

    /// Internal user id echoed back on the session
    pub client_reference_id: String,
}

/// Session as returned by the create call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    pub url: Option<String>,
}

/// Session re-fetched with its line items
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedSession {
    pub id: String,
    pub price_id: Option<String>,
    pub customer_id: Option<String>,
    pub client_reference_id: Option<String>,
}

/// Event type tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    CheckoutCompleted,
    Other(String),
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            CHECKOUT_COMPLETED => Self::CheckoutCompleted,
            other => Self::Other(other.to_string()),
        }
    }
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutCompleted => CHECKOUT_COMPLETED,
            Self::Other(s) => s,
        }
    }
}

/// A verified webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementEvent {
    pub id: String,
    pub kind: EventKind,

    /// `data.object.id` when the object is a checkout session
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

impl SettlementEvent {
    /// Parse a (verified) event envelope
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::MalformedSettlement(format!("invalid event body: {e}")))?;

        let kind = EventKind::from(raw.event_type.as_str());
        let session_id = match kind {
            EventKind::CheckoutCompleted => raw
                .data
                .object
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            EventKind::Other(_) => None,
        };

        Ok(Self {
            id: raw.id,
            kind,
            session_id,
        })
    }
}

/// Payment processor trait (Strategy pattern)
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession>;

    /// Re-fetch a checkout session with its line items expanded
    async fn retrieve_session(&self, session_id: &str) -> Result<EnrichedSession>;

    /// Verify a webhook signature and parse the event
    fn verify_webhook(
        &self,
        payload: &[u8],
        header: &str,
        secret: &str,
    ) -> Result<SettlementEvent> {
        signature::verify(payload, header, secret, self.webhook_tolerance_secs())?;
        SettlementEvent::from_json(payload)
    }

    /// Allowed signature timestamp skew
    fn webhook_tolerance_secs(&self) -> i64 {
        signature::DEFAULT_TOLERANCE_SECS
    }

    /// Processor name
    fn name(&self) -> &str;
}
