//! Play Store one-time product verification
//! (`purchases.products.get` in the Android Publisher API).

use aurapix_core::purchase::{PurchaseClaim, PurchaseError, PurchaseVerdict};
use serde::Deserialize;

use super::map_request_error;
use crate::http::ensure_success;

const API_BASE: &str = "https://androidpublisher.googleapis.com/androidpublisher/v3/applications";

/// `purchaseState` value for a completed purchase.
const PURCHASED: i32 = 0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductPurchase {
    #[serde(default)]
    pub purchase_state: Option<i32>,
    #[serde(default)]
    pub order_id: Option<String>,
}

pub struct PlayStoreVerifier {
    client: reqwest::Client,
    package_name: String,
    access_token: String,
}

impl PlayStoreVerifier {
    pub fn new(client: reqwest::Client, package_name: String, access_token: String) -> Self {
        Self {
            client,
            package_name,
            access_token,
        }
    }

    pub async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError> {
        let url = format!(
            "{API_BASE}/{}/purchases/products/{}/tokens/{}",
            self.package_name, claim.product_id, claim.receipt
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(PurchaseVerdict::rejected("Purchase token not found"));
        }
        let response = ensure_success(response)
            .await
            .map_err(|e| PurchaseError::Unavailable(format!("status {}: {}", e.status, e.body)))?;
        let body: ProductPurchase = response.json().await.map_err(map_request_error)?;
        Ok(verdict_from_purchase(&body, claim))
    }
}

/// Accept a completed purchase whose order id matches the claimed
/// transaction.
pub(crate) fn verdict_from_purchase(body: &ProductPurchase, claim: &PurchaseClaim) -> PurchaseVerdict {
    if body.purchase_state != Some(PURCHASED) {
        return PurchaseVerdict::rejected("Purchase is not in the purchased state");
    }
    match body.order_id {
        Some(ref order) if order == &claim.transaction_id => {
            PurchaseVerdict::accepted(claim.product_id.clone())
        }
        _ => PurchaseVerdict::rejected("Order id does not match transaction"),
    }
}
