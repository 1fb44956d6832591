//! Accounts and the Credit Ledger
//!
//! User records as seen by the payment flow, and the storage seam that
//! credits them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Stable user identifier issued by the identity system
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A user record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,

    /// Stripe customer id, provisioned outside this crate
    #[serde(default)]
    pub payment_customer_id: Option<String>,

    /// Credit balance
    #[serde(default)]
    pub credits: u64,
}

impl UserAccount {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            payment_customer_id: None,
            credits: 0,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.payment_customer_id = Some(customer_id.into());
        self
    }

    pub fn with_credits(mut self, credits: u64) -> Self {
        self.credits = credits;
        self
    }
}

/// A checkout session that has already been credited
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettledSession {
    pub session_id: String,
    pub user_id: UserId,
    pub credits: u64,
    pub settled_at: DateTime<Utc>,
}

/// Result of settling a checkout session against the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementRecord {
    /// Credits were added
    Applied { new_total: u64 },

    /// The session was settled before; nothing changed
    Duplicate { balance: u64 },
}

/// Credit storage trait
///
/// Increments must be atomic: concurrent settlements for one user may not
/// lose updates.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Get user by id
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserAccount>>;

    /// Get user by Stripe customer id
    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<UserAccount>>;

    /// Add credits, returning the new balance
    async fn increment_credits(&self, user_id: &UserId, amount: u64) -> Result<u64>;

    /// Add credits for a checkout session exactly once.
    ///
    /// The increment and the settled-session record are written together;
    /// a session seen before yields [`SettlementRecord::Duplicate`].
    async fn settle_session(
        &self,
        user_id: &UserId,
        session_id: &str,
        amount: u64,
    ) -> Result<SettlementRecord>;
}

#[derive(Default)]
struct Ledger {
    users: HashMap<UserId, UserAccount>,
    by_customer: HashMap<String, UserId>,
    settled: HashMap<String, SettledSession>,
}

impl Ledger {
    fn credit(&mut self, user_id: &UserId, amount: u64) -> Result<u64> {
        let account = self.users.get_mut(user_id).ok_or_else(|| {
            PaymentError::PersistenceFailed(format!("user {user_id} disappeared"))
        })?;

        account.credits = account.credits.checked_add(amount).ok_or_else(|| {
            PaymentError::PersistenceFailed(format!("credit balance overflow for {user_id}"))
        })?;

        Ok(account.credits)
    }
}

/// In-memory credit store (for development and tests)
#[derive(Default)]
pub struct MemoryCreditStore {
    ledger: RwLock<Ledger>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with accounts
    pub fn from_accounts(accounts: impl IntoIterator<Item = UserAccount>) -> Result<Self> {
        let mut ledger = Ledger::default();
        for account in accounts {
            insert_account(&mut ledger, account)?;
        }
        Ok(Self {
            ledger: RwLock::new(ledger),
        })
    }

    /// Insert or replace an account
    pub async fn insert(&self, account: UserAccount) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        insert_account(&mut ledger, account)
    }

    /// Sessions credited so far
    pub async fn settled_sessions(&self) -> Vec<SettledSession> {
        self.ledger.read().await.settled.values().cloned().collect()
    }

    pub async fn user_count(&self) -> usize {
        self.ledger.read().await.users.len()
    }
}

fn insert_account(ledger: &mut Ledger, account: UserAccount) -> Result<()> {
    if let Some(customer_id) = &account.payment_customer_id {
        if let Some(owner) = ledger.by_customer.get(customer_id) {
            if owner != &account.id {
                return Err(PaymentError::PersistenceFailed(format!(
                    "customer {customer_id} already belongs to {owner}"
                )));
            }
        }
    }

    if let Some(previous) = ledger.users.get(&account.id) {
        if let Some(old_customer) = &previous.payment_customer_id {
            ledger.by_customer.remove(old_customer);
        }
    }

    if let Some(customer_id) = &account.payment_customer_id {
        ledger
            .by_customer
            .insert(customer_id.clone(), account.id.clone());
    }
    ledger.users.insert(account.id.clone(), account);

    Ok(())
}

#[async_trait]
impl CreditStore for MemoryCreditStore {
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserAccount>> {
        let ledger = self.ledger.read().await;
        Ok(ledger.users.get(id).cloned())
    }

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<UserAccount>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .by_customer
            .get(customer_id)
            .and_then(|id| ledger.users.get(id))
            .cloned())
    }

    async fn increment_credits(&self, user_id: &UserId, amount: u64) -> Result<u64> {
        let mut ledger = self.ledger.write().await;
        ledger.credit(user_id, amount)
    }

    async fn settle_session(
        &self,
        user_id: &UserId,
        session_id: &str,
        amount: u64,
    ) -> Result<SettlementRecord> {
        let mut ledger = self.ledger.write().await;

        if ledger.settled.contains_key(session_id) {
            let balance = ledger.users.get(user_id).map_or(0, |u| u.credits);
            return Ok(SettlementRecord::Duplicate { balance });
        }

        let new_total = ledger.credit(user_id, amount)?;
        ledger.settled.insert(
            session_id.to_string(),
            SettledSession {
                session_id: session_id.to_string(),
                user_id: user_id.clone(),
                credits: amount,
                settled_at: Utc::now(),
            },
        );

        Ok(SettlementRecord::Applied { new_total })
    }
}
