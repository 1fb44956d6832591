//! Mock Payment Processor
//!
//! For tests and local demos. Returns scripted sessions and counts calls,
//! never touching the network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CheckoutSessionRequest, CreatedSession, EnrichedSession, PaymentProcessor};
use crate::error::{PaymentError, Result};

/// How `create_checkout_session` behaves
#[derive(Clone, Debug, PartialEq, Eq)]
enum CheckoutBehavior {
    Succeed,
    NoUrl,
    Fail,
}

/// Scripted processor
pub struct MockProcessor {
    sessions: HashMap<String, EnrichedSession>,
    checkout: CheckoutBehavior,
    retrieve_delay: Option<Duration>,
    created: AtomicUsize,
    retrieved: AtomicUsize,
    requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessor {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            checkout: CheckoutBehavior::Succeed,
            retrieve_delay: None,
            created: AtomicUsize::new(0),
            retrieved: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script a session returned by `retrieve_session`
    pub fn with_session(mut self, session: EnrichedSession) -> Self {
        self.sessions.insert(session.id.clone(), session);
        self
    }

    /// Shorthand for a completed session with price and customer
    pub fn with_paid_session(self, session_id: &str, price_id: &str, customer_id: &str) -> Self {
        self.with_session(EnrichedSession {
            id: session_id.to_string(),
            price_id: Some(price_id.to_string()),
            customer_id: Some(customer_id.to_string()),
            client_reference_id: None,
        })
    }

    /// Checkout sessions come back without a URL
    pub fn without_checkout_url(mut self) -> Self {
        self.checkout = CheckoutBehavior::NoUrl;
        self
    }

    /// Checkout creation errors out
    pub fn failing_checkout(mut self) -> Self {
        self.checkout = CheckoutBehavior::Fail;
        self
    }

    /// Stall every `retrieve_session` call
    pub fn with_retrieve_delay(mut self, delay: Duration) -> Self {
        self.retrieve_delay = Some(delay);
        self
    }

    pub fn checkout_calls(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieved.load(Ordering::SeqCst)
    }

    /// Requests received by `create_checkout_session`
    pub async fn checkout_requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CreatedSession> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().await.push(request.clone());

        let id = format!("cs_test_{n}");
        match self.checkout {
            CheckoutBehavior::Succeed => Ok(CreatedSession {
                url: Some(format!("https://checkout.stripe.com/c/pay/{id}")),
                id,
            }),
            CheckoutBehavior::NoUrl => Ok(CreatedSession { id, url: None }),
            CheckoutBehavior::Fail => Err(PaymentError::SessionCreationFailed(
                "mock processor unavailable".into(),
            )),
        }
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<EnrichedSession> {
        self.retrieved.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.retrieve_delay {
            tokio::time::sleep(delay).await;
        }

        self.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::EnrichmentFailed(format!("no such session {session_id}")))
    }

    fn name(&self) -> &str {
        "MockProcessor"
    }
}
