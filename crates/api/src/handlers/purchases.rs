//! Handlers for purchase credits and the hosted-checkout webhook.

use std::time::Duration;

use aurapix_core::credit::PurchaseStore;
use aurapix_core::error::CoreError;
use aurapix_core::purchase::PurchaseClaim;
use aurapix_core::types::DbId;
use aurapix_pipeline::credits::WebhookOutcome;
use aurapix_pipeline::listeners::PurchaseOutcome;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying `t=<unix seconds>,v1=<hex digest>`.
pub const CHECKOUT_SIGNATURE_HEADER: &str = "checkout-signature";

const DEFAULT_WAIT_SECS: u64 = 20;

/// Body of `POST /purchases/validate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePurchaseRequest {
    /// `app_store` / `play_store` / `hosted_checkout`, or `ios` / `android` / `web`.
    pub platform: String,
    pub receipt: String,
    pub product_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitParams {
    pub timeout_secs: Option<u64>,
}

/// Result of the checkout long-poll.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutStatus {
    Credited {
        #[serde(rename = "paymentId")]
        credit_id: DbId,
    },
    Rejected { reason: String },
    /// Nothing arrived before the timeout; the client should poll again.
    Pending,
}

impl From<PurchaseOutcome> for CheckoutStatus {
    fn from(outcome: PurchaseOutcome) -> Self {
        match outcome {
            PurchaseOutcome::Credited { credit_id } => Self::Credited { credit_id },
            PurchaseOutcome::Rejected { reason } => Self::Rejected { reason },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReceipt {
    pub received: bool,
    #[serde(rename = "paymentId")]
    pub credit_id: Option<DbId>,
}

/// GET /api/v1/purchases/access
pub async fn check_access(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let access = state.pipeline.credits.check_access(auth.owner_id).await?;
    Ok(Json(DataResponse { data: access }))
}

/// GET /api/v1/purchases
pub async fn list_credits(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let credits = state.pipeline.credits.list_credits(auth.owner_id).await?;
    Ok(Json(DataResponse { data: credits }))
}

/// POST /api/v1/purchases/validate
///
/// Verify a store receipt and record its credit. Repeating the call for
/// the same transaction returns the same credit.
pub async fn validate_purchase(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ValidatePurchaseRequest>,
) -> AppResult<impl IntoResponse> {
    let claim = PurchaseClaim {
        store: PurchaseStore::parse(&input.platform)?,
        receipt: input.receipt,
        product_id: input.product_id,
        transaction_id: input.transaction_id,
    };
    let result = state
        .pipeline
        .credits
        .validate_external_purchase(auth.owner_id, &claim)
        .await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/purchases/checkout/{id}/wait
///
/// Long-poll until the checkout session's webhook has been applied. The
/// listener is registered before the ledger is checked so a webhook
/// landing in between is not missed.
pub async fn wait_for_checkout(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<WaitParams>,
) -> AppResult<impl IntoResponse> {
    let credits = &state.pipeline.credits;
    let pending = credits.listeners().register(&session_id);

    if let Some(credit_id) = credits
        .credited_transaction(auth.owner_id, &session_id)
        .await?
    {
        return Ok(Json(DataResponse {
            data: CheckoutStatus::Credited { credit_id },
        }));
    }

    let secs = params
        .timeout_secs
        .unwrap_or(DEFAULT_WAIT_SECS)
        .min(state.config.checkout_wait_max_secs);
    let status = match pending.wait(Duration::from_secs(secs)).await {
        // Re-read so a session credited to another account is a conflict.
        Some(PurchaseOutcome::Credited { .. }) => match credits
            .credited_transaction(auth.owner_id, &session_id)
            .await?
        {
            Some(credit_id) => CheckoutStatus::Credited { credit_id },
            None => CheckoutStatus::Pending,
        },
        Some(outcome) => outcome.into(),
        None => CheckoutStatus::Pending,
    };
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/webhooks/checkout
///
/// Authenticated by the HMAC signature header, not a bearer token.
pub async fn checkout_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(CHECKOUT_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Checkout-Signature header".into(),
            ))
        })?;

    let outcome = state
        .pipeline
        .credits
        .handle_checkout_webhook(signature, &body)
        .await?;

    let credit_id = match outcome {
        WebhookOutcome::Credited { credit_id } => Some(credit_id),
        WebhookOutcome::Ignored => None,
    };
    Ok(Json(DataResponse {
        data: WebhookReceipt {
            received: true,
            credit_id,
        },
    }))
}
