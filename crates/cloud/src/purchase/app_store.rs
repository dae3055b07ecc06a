//! App Store receipt verification (`verifyReceipt`).

use aurapix_core::purchase::{PurchaseClaim, PurchaseError, PurchaseVerdict};
use serde::{Deserialize, Serialize};

use super::map_request_error;
use crate::http::ensure_success;

const PRODUCTION_URL: &str = "https://buy.itunes.apple.com/verifyReceipt";
const SANDBOX_URL: &str = "https://sandbox.itunes.apple.com/verifyReceipt";

/// Receipt is from the sandbox; resend it there.
const STATUS_SANDBOX_RECEIPT: i32 = 21007;

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "receipt-data")]
    receipt_data: &'a str,
    password: &'a str,
    #[serde(rename = "exclude-old-transactions")]
    exclude_old_transactions: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyResponse {
    pub status: i32,
    #[serde(default)]
    pub receipt: Option<Receipt>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Receipt {
    #[serde(default)]
    pub in_app: Vec<InAppPurchase>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InAppPurchase {
    pub product_id: String,
    pub transaction_id: String,
}

pub struct AppStoreVerifier {
    client: reqwest::Client,
    shared_secret: String,
    use_sandbox: bool,
}

impl AppStoreVerifier {
    pub fn new(client: reqwest::Client, shared_secret: String, use_sandbox: bool) -> Self {
        Self {
            client,
            shared_secret,
            use_sandbox,
        }
    }

    async fn post(&self, url: &str, receipt: &str) -> Result<VerifyResponse, PurchaseError> {
        let response = self
            .client
            .post(url)
            .json(&VerifyRequest {
                receipt_data: receipt,
                password: &self.shared_secret,
                exclude_old_transactions: false,
            })
            .send()
            .await
            .map_err(map_request_error)?;
        let response = ensure_success(response)
            .await
            .map_err(|e| PurchaseError::Unavailable(format!("status {}: {}", e.status, e.body)))?;
        response.json().await.map_err(map_request_error)
    }

    pub async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError> {
        let first_url = if self.use_sandbox { SANDBOX_URL } else { PRODUCTION_URL };
        let mut body = self.post(first_url, &claim.receipt).await?;
        if body.status == STATUS_SANDBOX_RECEIPT && !self.use_sandbox {
            tracing::debug!(transaction_id = %claim.transaction_id, "Retrying receipt against sandbox");
            body = self.post(SANDBOX_URL, &claim.receipt).await?;
        }
        Ok(verdict_from_response(&body, &claim.transaction_id))
    }
}

/// Accept when the receipt is valid and contains the claimed transaction.
pub(crate) fn verdict_from_response(body: &VerifyResponse, transaction_id: &str) -> PurchaseVerdict {
    if body.status != 0 {
        return PurchaseVerdict::rejected(format!("App Store status {}", body.status));
    }
    body.receipt
        .as_ref()
        .and_then(|r| r.in_app.iter().find(|p| p.transaction_id == transaction_id))
        .map(|p| PurchaseVerdict::accepted(p.product_id.clone()))
        .unwrap_or_else(|| PurchaseVerdict::rejected("Transaction not found in receipt"))
}
