//! Contract for validating a purchase with the store that processed it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credit::PurchaseStore;
use crate::error::CoreError;

/// A purchase as reported by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseClaim {
    pub store: PurchaseStore,
    /// Store receipt (App Store), purchase token (Play Store), or checkout
    /// session id (hosted checkout).
    pub receipt: String,
    pub product_id: String,
    pub transaction_id: String,
}

/// The store's answer for one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseVerdict {
    pub valid: bool,
    /// Product the store says was bought, when known.
    pub product_id: Option<String>,
    /// Reason when `valid` is false.
    pub reason: Option<String>,
}

impl PurchaseVerdict {
    pub fn accepted(product_id: impl Into<String>) -> Self {
        Self {
            valid: true,
            product_id: Some(product_id.into()),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            product_id: None,
            reason: Some(reason.into()),
        }
    }
}

/// Errors from talking to a purchase store.
#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error("Purchase store request timed out")]
    Timeout,

    #[error("Purchase store unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected purchase store response: {0}")]
    InvalidResponse(String),

    #[error("Store '{0}' is not configured")]
    NotConfigured(&'static str),
}

impl From<PurchaseError> for CoreError {
    fn from(err: PurchaseError) -> Self {
        match err {
            PurchaseError::Timeout => CoreError::ExternalServiceTimeout {
                service: "purchase_store",
                detail: err.to_string(),
            },
            PurchaseError::NotConfigured(_) => CoreError::Validation(err.to_string()),
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// Validates purchases against the issuing store.
#[async_trait]
pub trait PurchaseVerifier: Send + Sync {
    async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError>;
}
