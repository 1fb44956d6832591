//! Stripe Webhook Signatures
//!
//! Verifies the `Stripe-Signature` header (`t=<ts>,v1=<hex>`) against the
//! raw request body. The body must be exactly the bytes Stripe sent.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default allowed clock skew between Stripe and us, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify a signature header against a payload at the current time
pub fn verify(payload: &[u8], header: &str, secret: &str, tolerance_secs: i64) -> Result<()> {
    verify_at(payload, header, secret, tolerance_secs, Utc::now().timestamp())
}

/// Verify a signature header as of `now` (unix seconds)
pub fn verify_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    if secret.is_empty() {
        return Err(PaymentError::AuthenticationFailed("webhook secret not configured".into()));
    }

    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            match key {
                "t" => timestamp = Some(value),
                "v1" => signatures.push(value),
                _ => {}
            }
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::AuthenticationFailed("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::AuthenticationFailed("missing v1 signature".into()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::AuthenticationFailed("invalid timestamp".into()))?;
    if now.abs_diff(ts) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::AuthenticationFailed(format!(
            "timestamp outside tolerance of {tolerance_secs}s"
        )));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::AuthenticationFailed("unusable webhook secret".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::AuthenticationFailed("signature mismatch".into()))
    }
}

/// Build a signature header for `payload`, as Stripe would
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={timestamp},v1={signature}")
}
