//! Payment Error Types

use thiserror::Error;

use crate::account::UserId;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised while buying or settling credit packs
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Requested price id is not part of the catalog
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    /// Checkout attempted without a signed-in user
    #[error("User not authenticated")]
    Unauthenticated,

    /// User has no Stripe customer attached
    #[error("User {0} has no payment profile")]
    NoPaymentProfile(UserId),

    /// Stripe did not hand back a usable checkout session
    #[error("Checkout session creation failed: {0}")]
    SessionCreationFailed(String),

    /// Webhook signature missing, stale or wrong
    #[error("Webhook authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Verified webhook whose data is incomplete
    #[error("Malformed settlement: {0}")]
    MalformedSettlement(String),

    /// Settled price id is not in this deployment's catalog
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// No user owns the settled Stripe customer
    #[error("Unknown customer: {0}")]
    UnknownCustomer(String),

    /// Re-fetching the checkout session from Stripe failed
    #[error("Session enrichment failed: {0}")]
    EnrichmentFailed(String),

    /// Storage failure while crediting
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Whether Stripe should redeliver the event that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::EnrichmentFailed(_) | PaymentError::PersistenceFailed(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::InvalidPackage(_) => "That credit pack does not exist.",
            PaymentError::Unauthenticated => "Please sign in to buy credits.",
            PaymentError::NoPaymentProfile(_) => {
                "Your account is not ready for payments yet. Please contact support."
            }
            PaymentError::SessionCreationFailed(_) => {
                "Payment processing failed. Please try again."
            }
            PaymentError::AuthenticationFailed(_) => "Invalid signature.",
            PaymentError::MalformedSettlement(_) => "Missing price or customer information.",
            PaymentError::UnknownPackage(_) => "Invalid price ID.",
            PaymentError::UnknownCustomer(_) => "User not found.",
            PaymentError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
