//! # thumbgo-payments
//!
//! Credit pack purchases for thumbgo: Stripe Checkout on the way in,
//! signed webhooks on the way back.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  price id   ┌──────────────────┐  session   ┌─────────────────┐
//! │ Browser  │────────────▶│ CheckoutInitiator │──────────▶│  Stripe Hosted  │
//! │          │◀────────────│                   │           │  Checkout Page  │
//! └──────────┘  303 → url  └──────────────────┘           └────────┬────────┘
//!                                                                   │ webhook
//!                          ┌──────────────────┐  +credits  ┌────────▼────────┐
//!                          │   CreditStore     │◀──────────│SettlementHandler│
//!                          └──────────────────┘            └─────────────────┘
//! ```
//!
//! The two halves never call each other. They are tied together by the
//! Stripe customer id stored on the user and the session id carried by the
//! `checkout.session.completed` event.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use thumbgo_payments::{
//!     CheckoutInitiator, CheckoutUrls, MemoryCreditStore, PackageCatalog, StripeProcessor,
//! };
//!
//! let catalog = Arc::new(PackageCatalog::parse("price_abc:10,price_def:25")?);
//! let processor = Arc::new(StripeProcessor::new("sk_test_xxx"));
//! let store = Arc::new(MemoryCreditStore::new());
//!
//! let checkout = CheckoutInitiator::new(
//!     processor,
//!     store,
//!     catalog,
//!     CheckoutUrls::new("https://www.thumbgo.co/dashboard")?,
//! );
//!
//! let redirect = checkout.initiate("price_abc", Some(&user_id)).await?;
//! // Redirect user to: redirect.url
//! ```

mod account;
mod catalog;
mod checkout;
mod error;
pub mod processor;
pub mod signature;
mod webhook;

pub use account::{
    CreditStore, MemoryCreditStore, SettledSession, SettlementRecord, UserAccount, UserId,
};
pub use catalog::{CreditPackage, PackageCatalog};
pub use checkout::{CheckoutInitiator, CheckoutRedirect, CheckoutUrls, DEFAULT_PROCESSOR_TIMEOUT};
pub use error::{PaymentError, Result};
pub use processor::{MockProcessor, PaymentProcessor, StripeProcessor};
pub use webhook::{Acknowledgement, SettlementHandler, SettlementOutcome};
