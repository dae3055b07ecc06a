//! HMAC-SHA256 signatures for inbound checkout webhooks.
//!
//! Header format: `t=<unix seconds>,v1=<hex digest>[,v1=<hex digest>...]`,
//! where each digest is `HMAC_SHA256(secret, "{t}.{body}")`. Multiple `v1`
//! entries appear while the provider rotates secrets.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Compute the hex HMAC for a timestamped payload.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("{:x}", mac.finalize().into_bytes())
}

/// Build a header value for `payload` (used by tests and local tooling).
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={timestamp},v1={}", compute_signature(secret, timestamp, payload))
}

/// Verify a signature header against the raw request body.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), CoreError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| CoreError::Unauthorized("Signature header has no timestamp".into()))?;
    if candidates.is_empty() {
        return Err(CoreError::Unauthorized(
            "Signature header has no v1 signature".into(),
        ));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(CoreError::Unauthorized(
            "Signature timestamp outside tolerance".into(),
        ));
    }

    let expected = compute_signature(secret, timestamp, payload);
    if candidates
        .iter()
        .any(|c| constant_time_eq(c.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(CoreError::Unauthorized("Signature mismatch".into()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
