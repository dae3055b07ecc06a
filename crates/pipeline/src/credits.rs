//! Purchase credit gate.
//!
//! Reconciles store receipts and hosted-checkout sessions with the local
//! credit ledger and owns the only redemption path. A transaction id maps
//! to at most one credit; repeated validation returns that credit without
//! asking the store again.

use std::collections::HashMap;
use std::sync::Arc;

use aurapix_core::credit::{
    ensure_expected_product, ensure_transaction_owner, redeem_failure, AccessStatus, PurchaseStore,
};
use aurapix_core::error::CoreError;
use aurapix_core::purchase::{PurchaseClaim, PurchaseVerifier};
use aurapix_core::signature::verify_signature;
use aurapix_core::types::DbId;
use aurapix_db::models::credit::{CreateCredit, PurchaseCredit};
use aurapix_db::repositories::{AccountRepo, CreditRepo};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::PipelineResult;
use crate::listeners::{PurchaseListeners, PurchaseOutcome};
use crate::views::{CreditView, PurchaseValidation};

/// Checkout events that mean the session is paid.
const PAID_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

#[derive(Debug, Deserialize)]
struct CheckoutEvent {
    #[serde(rename = "type")]
    kind: String,
    data: CheckoutEventData,
}

#[derive(Debug, Deserialize)]
struct CheckoutEventData {
    object: CheckoutSession,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    client_reference_id: Option<String>,
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Credited { credit_id: DbId },
    /// Signed and well-formed, but not an event that grants a credit.
    Ignored,
}

#[derive(Clone)]
pub struct CreditGate {
    pool: PgPool,
    verifier: Arc<dyn PurchaseVerifier>,
    listeners: PurchaseListeners,
    product_id: String,
    webhook_secret: Option<String>,
}

impl CreditGate {
    pub fn new(
        pool: PgPool,
        verifier: Arc<dyn PurchaseVerifier>,
        listeners: PurchaseListeners,
        product_id: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            pool,
            verifier,
            listeners,
            product_id: product_id.into(),
            webhook_secret,
        }
    }

    pub fn listeners(&self) -> &PurchaseListeners {
        &self.listeners
    }

    /// False when no webhook secret is configured; hosted checkout then
    /// never credits anything.
    pub fn accepts_checkout_webhooks(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Whether the owner may start a full generation. Read-only.
    pub async fn check_access(&self, owner_id: DbId) -> PipelineResult<AccessStatus> {
        let oldest = CreditRepo::oldest_unredeemed(&self.pool, owner_id).await?;
        Ok(AccessStatus::from_oldest_unredeemed(oldest.map(|c| c.id)))
    }

    /// The owner's ledger, newest first.
    pub async fn list_credits(&self, owner_id: DbId) -> PipelineResult<Vec<CreditView>> {
        let credits = CreditRepo::list_for_owner(&self.pool, owner_id).await?;
        Ok(credits
            .iter()
            .map(CreditView::try_from)
            .collect::<Result<_, _>>()?)
    }

    /// Validate a purchase and record its credit.
    ///
    /// Idempotent on `transaction_id`: a transaction that already has a
    /// credit returns it without calling the store. A transaction owned by
    /// another account is a `Conflict`.
    pub async fn validate_external_purchase(
        &self,
        owner_id: DbId,
        claim: &PurchaseClaim,
    ) -> PipelineResult<PurchaseValidation> {
        ensure_expected_product(&claim.product_id, &self.product_id)?;
        if claim.transaction_id.trim().is_empty() {
            return Err(CoreError::Validation("transactionId must not be empty".into()).into());
        }

        if let Some(existing) =
            CreditRepo::find_by_transaction(&self.pool, &claim.transaction_id).await?
        {
            ensure_transaction_owner(existing.owner_id, owner_id, &claim.transaction_id)?;
            tracing::debug!(
                owner_id,
                credit_id = existing.id,
                transaction_id = %claim.transaction_id,
                "Transaction already credited",
            );
            return Ok(PurchaseValidation::credited(existing.id));
        }

        let verdict = self.verifier.verify(claim).await?;
        if !verdict.valid {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "Purchase could not be verified".to_string());
            tracing::info!(
                owner_id,
                store = claim.store.as_str(),
                transaction_id = %claim.transaction_id,
                reason = %reason,
                "Purchase rejected by store",
            );
            self.listeners.resolve(
                &claim.transaction_id,
                PurchaseOutcome::Rejected {
                    reason: reason.clone(),
                },
            );
            return Ok(PurchaseValidation::rejected(reason));
        }
        if let Some(ref product_id) = verdict.product_id {
            ensure_expected_product(product_id, &self.product_id)?;
        }

        let credit = self
            .record_credit(owner_id, claim.store, &claim.transaction_id)
            .await?;
        Ok(PurchaseValidation::credited(credit.id))
    }

    /// Apply a signed hosted-checkout webhook delivery.
    pub async fn handle_checkout_webhook(
        &self,
        signature_header: &str,
        payload: &[u8],
    ) -> PipelineResult<WebhookOutcome> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| CoreError::Forbidden("Checkout webhooks are not configured".into()))?;
        verify_signature(secret, signature_header, payload, chrono::Utc::now().timestamp())?;

        let event: CheckoutEvent = serde_json::from_slice(payload)
            .map_err(|e| CoreError::Validation(format!("Malformed checkout event: {e}")))?;
        let session = event.data.object;

        if !PAID_EVENTS.contains(&event.kind.as_str())
            || session.payment_status.as_deref() != Some("paid")
        {
            tracing::debug!(
                event = %event.kind,
                session_id = %session.id,
                "Ignoring checkout event",
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let subject = session.client_reference_id.ok_or_else(|| {
            CoreError::Validation("Checkout session has no client_reference_id".into())
        })?;
        if let Some(product_id) = session.metadata.get("product_id") {
            ensure_expected_product(product_id, &self.product_id)?;
        }

        let account = AccountRepo::find_or_create(&self.pool, &subject).await?;
        let credit = self
            .record_credit(account.id, PurchaseStore::HostedCheckout, &session.id)
            .await?;
        Ok(WebhookOutcome::Credited {
            credit_id: credit.id,
        })
    }

    /// The credit for `transaction_id` if it exists and belongs to the owner.
    pub async fn credited_transaction(
        &self,
        owner_id: DbId,
        transaction_id: &str,
    ) -> PipelineResult<Option<DbId>> {
        match CreditRepo::find_by_transaction(&self.pool, transaction_id).await? {
            Some(credit) => {
                ensure_transaction_owner(credit.owner_id, owner_id, transaction_id)?;
                Ok(Some(credit.id))
            }
            None => Ok(None),
        }
    }

    /// Move an owned credit `unredeemed -> redeemed` on `conn`.
    ///
    /// This is the only redemption path. The caller's transaction decides
    /// whether the redemption sticks.
    pub async fn redeem(
        &self,
        conn: &mut PgConnection,
        credit_id: DbId,
        owner_id: DbId,
    ) -> PipelineResult<PurchaseCredit> {
        if let Some(credit) = CreditRepo::redeem(&mut *conn, credit_id, owner_id).await? {
            tracing::info!(owner_id, credit_id, "Credit redeemed");
            return Ok(credit);
        }

        let current = CreditRepo::find_by_id(&mut *conn, credit_id)
            .await?
            .map(|c| c.status().map(|s| (c.owner_id, s)))
            .transpose()?;
        Err(redeem_failure(credit_id, owner_id, current).into())
    }

    /// Give back the credit of a batch that produced nothing.
    ///
    /// Runs on the caller's connection so it commits together with the
    /// batch's terminal status.
    pub(crate) async fn restore_for_failed_batch(
        &self,
        conn: &mut PgConnection,
        credit_id: DbId,
        batch_id: DbId,
    ) -> PipelineResult<bool> {
        let restored = CreditRepo::restore(conn, credit_id, batch_id).await?;
        if restored {
            tracing::warn!(credit_id, batch_id, "Batch produced no images, credit restored");
        }
        Ok(restored)
    }

    async fn record_credit(
        &self,
        owner_id: DbId,
        store: PurchaseStore,
        transaction_id: &str,
    ) -> PipelineResult<PurchaseCredit> {
        let input = CreateCredit {
            owner_id,
            store: store.as_str().to_string(),
            product_id: self.product_id.clone(),
            external_transaction_id: transaction_id.to_string(),
        };

        let credit = match CreditRepo::insert_if_absent(&self.pool, &input).await? {
            Some(credit) => {
                tracing::info!(
                    owner_id,
                    credit_id = credit.id,
                    store = store.as_str(),
                    transaction_id,
                    "Purchase credit recorded",
                );
                credit
            }
            None => {
                let existing = CreditRepo::find_by_transaction(&self.pool, transaction_id)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Internal(format!(
                            "Credit for transaction '{transaction_id}' vanished after conflict"
                        ))
                    })?;
                ensure_transaction_owner(existing.owner_id, owner_id, transaction_id)?;
                existing
            }
        };

        self.listeners.resolve(
            transaction_id,
            PurchaseOutcome::Credited {
                credit_id: credit.id,
            },
        );
        Ok(credit)
    }
}
