//! Handlers for paid full generation.
//!
//! Routes:
//! - `POST  /generations`           -- redeem a credit and start a batch
//! - `GET   /generations`           -- list batches with images
//! - `GET   /generations/status`    -- is a batch in flight?
//! - `GET   /generations/{id}`      -- poll one batch

use aurapix_core::types::DbId;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGenerationRequest {
    /// Exactly six distinct catalog scenarios.
    pub scenarios: Vec<String>,
    /// Credit to redeem; defaults to the oldest unredeemed one.
    pub credit_id: Option<DbId>,
}

/// POST /api/v1/generations
pub async fn start_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<StartGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    let batch = state
        .pipeline
        .generation
        .start_full(auth.owner_id, input.scenarios, input.credit_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: batch })))
}

/// GET /api/v1/generations
pub async fn list_generations(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let batches = state.pipeline.generation.list_batches(auth.owner_id).await?;
    Ok(Json(DataResponse { data: batches }))
}

/// GET /api/v1/generations/status
pub async fn generation_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let status = state
        .pipeline
        .generation
        .generation_status(auth.owner_id)
        .await?;
    Ok(Json(DataResponse { data: status }))
}

/// GET /api/v1/generations/{id}
pub async fn poll_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = state
        .pipeline
        .generation
        .poll_full(auth.owner_id, batch_id)
        .await?;
    Ok(Json(DataResponse { data: batch }))
}
