//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Redirect,
    Form, Json,
};
use serde::{Deserialize, Serialize};

use thumbgo_payments::{Acknowledgement, CreditPackage, PaymentError};

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    pub packages: Vec<CreditPackage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditsResponse {
    pub user_id: String,
    pub credits: u64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub price_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.payments_enabled(),
    })
}

/// Credit packs on sale
pub async fn list_packages(State(state): State<AppState>) -> Json<PackagesResponse> {
    Json(PackagesResponse {
        packages: state.catalog.packages().into_iter().cloned().collect(),
    })
}

/// Current user's balance
pub async fn get_credits(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CreditsResponse>, ApiError> {
    let user_id = user.id().ok_or(PaymentError::Unauthenticated)?;

    let account = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    Ok(Json(CreditsResponse {
        user_id: account.id.to_string(),
        credits: account.credits,
    }))
}

/// Create a Stripe checkout session and send the browser there
pub async fn create_checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CheckoutForm>,
) -> Result<Redirect, ApiError> {
    let checkout = state.checkout.as_ref().ok_or(ApiError::PaymentsDisabled)?;

    let redirect = checkout.initiate(&form.price_id, user.id()).await?;

    Ok(Redirect::to(&redirect.url))
}

/// Stripe webhook handler
///
/// Takes the body as raw bytes; the signature covers the exact payload.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Acknowledgement>, ApiError> {
    let settlement = state.settlement.as_ref().ok_or(ApiError::PaymentsDisabled)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let outcome = settlement.handle(&body, signature).await?;

    Ok(Json(Acknowledgement::from(&outcome)))
}
