//! Hosted checkout session verification (Stripe-compatible
//! `GET /v1/checkout/sessions/{id}`).

use std::collections::HashMap;

use aurapix_core::purchase::{PurchaseClaim, PurchaseError, PurchaseVerdict};
use serde::Deserialize;

use super::map_request_error;
use crate::http::ensure_success;

#[derive(Debug, Deserialize)]
pub(crate) struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

pub struct CheckoutVerifier {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl CheckoutVerifier {
    pub fn new(client: reqwest::Client, api_url: String, secret_key: String) -> Self {
        Self {
            client,
            api_url,
            secret_key,
        }
    }

    /// The checkout session id doubles as the transaction id; the
    /// `receipt` field is ignored.
    pub async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_url, claim.transaction_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(PurchaseVerdict::rejected("Checkout session not found"));
        }
        let response = ensure_success(response)
            .await
            .map_err(|e| PurchaseError::Unavailable(format!("status {}: {}", e.status, e.body)))?;
        let session: CheckoutSession = response.json().await.map_err(map_request_error)?;
        Ok(verdict_from_session(&session, claim))
    }
}

/// Accept a paid session. The product comes from session metadata when
/// present, otherwise from the claim.
pub(crate) fn verdict_from_session(session: &CheckoutSession, claim: &PurchaseClaim) -> PurchaseVerdict {
    if session.id != claim.transaction_id {
        return PurchaseVerdict::rejected("Session id does not match transaction");
    }
    if session.payment_status.as_deref() != Some("paid") {
        return PurchaseVerdict::rejected("Checkout session is not paid");
    }
    let product = session
        .metadata
        .get("product_id")
        .cloned()
        .unwrap_or_else(|| claim.product_id.clone());
    PurchaseVerdict::accepted(product)
}

#[cfg(test)]
mod tests {
    use aurapix_core::credit::PurchaseStore;

    use super::*;

    fn claim() -> PurchaseClaim {
        PurchaseClaim {
            store: PurchaseStore::HostedCheckout,
            receipt: String::new(),
            product_id: "pack".into(),
            transaction_id: "cs_test_1".into(),
        }
    }

    #[test]
    fn paid_session_is_accepted_with_metadata_product() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_test_1","payment_status":"paid","metadata":{"product_id":"other"}}"#,
        )
        .unwrap();
        let verdict = verdict_from_session(&session, &claim());
        assert!(verdict.valid);
        assert_eq!(verdict.product_id.as_deref(), Some("other"));
    }

    #[test]
    fn unpaid_session_is_rejected() {
        let session: CheckoutSession =
            serde_json::from_str(r#"{"id":"cs_test_1","payment_status":"unpaid"}"#).unwrap();
        assert!(!verdict_from_session(&session, &claim()).valid);
    }

    #[test]
    fn other_session_is_rejected() {
        let session: CheckoutSession =
            serde_json::from_str(r#"{"id":"cs_test_2","payment_status":"paid"}"#).unwrap();
        assert!(!verdict_from_session(&session, &claim()).valid);
    }
}
