//! API Error Mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use thumbgo_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Errors returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Payments not configured")]
    PaymentsDisabled,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Payment(e) => match e {
                PaymentError::InvalidPackage(_)
                | PaymentError::AuthenticationFailed(_)
                | PaymentError::MalformedSettlement(_)
                | PaymentError::UnknownPackage(_) => StatusCode::BAD_REQUEST,
                PaymentError::Unauthenticated => StatusCode::UNAUTHORIZED,
                PaymentError::NoPaymentProfile(_) => StatusCode::FORBIDDEN,
                PaymentError::UnknownCustomer(_) => StatusCode::NOT_FOUND,
                PaymentError::SessionCreationFailed(_) => StatusCode::BAD_GATEWAY,
                PaymentError::EnrichmentFailed(_)
                | PaymentError::PersistenceFailed(_)
                | PaymentError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::PaymentsDisabled => "PAYMENTS_DISABLED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::Payment(e) => match e {
                PaymentError::InvalidPackage(_) => "INVALID_PACKAGE",
                PaymentError::Unauthenticated => "UNAUTHENTICATED",
                PaymentError::NoPaymentProfile(_) => "NO_PAYMENT_PROFILE",
                PaymentError::SessionCreationFailed(_) => "CHECKOUT_ERROR",
                PaymentError::AuthenticationFailed(_) => "INVALID_SIGNATURE",
                PaymentError::MalformedSettlement(_) => "MALFORMED_SETTLEMENT",
                PaymentError::UnknownPackage(_) => "UNKNOWN_PACKAGE",
                PaymentError::UnknownCustomer(_) => "UNKNOWN_CUSTOMER",
                PaymentError::EnrichmentFailed(_) => "ENRICHMENT_FAILED",
                PaymentError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
                PaymentError::Config(_) => "CONFIG_ERROR",
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Payment(e) => e.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.message(),
            code: self.error_code().into(),
        };

        (status, Json(body)).into_response()
    }
}
