//! Request Extractors

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

use thumbgo_payments::UserId;

use crate::state::AppState;

/// The signed-in user, if any.
///
/// Identity is established upstream; the auth proxy forwards the user id
/// in a trusted header (see `AUTH_USER_HEADER`).
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<UserId>);

impl CurrentUser {
    pub fn id(&self) -> Option<&UserId> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(&state.user_header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(UserId::new);

        Ok(Self(user_id))
    }
}
