//! Handlers for the pre-purchase preview (sample) generation.

use aurapix_core::scenario::{FULL_SCENARIO_COUNT, PREVIEW_SCENARIOS, SCENARIO_CATALOG};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/samples
///
/// Start (or reuse) the sample job for the owner's accepted photo set.
pub async fn start_sample(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let start = state.pipeline.generation.start_sample(auth.owner_id).await?;
    Ok(Json(DataResponse { data: start }))
}

/// GET /api/v1/samples
///
/// Poll the latest sample job; images are present once it completes.
pub async fn poll_sample(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let poll = state.pipeline.generation.poll_sample(auth.owner_id).await?;
    Ok(Json(DataResponse { data: poll }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioCatalog {
    pub preview: &'static [&'static str],
    pub full_count: usize,
    pub scenarios: &'static [aurapix_core::scenario::ScenarioInfo],
}

/// GET /api/v1/scenarios
pub async fn list_scenarios(_auth: AuthUser) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: ScenarioCatalog {
            preview: &PREVIEW_SCENARIOS,
            full_count: FULL_SCENARIO_COUNT,
            scenarios: SCENARIO_CATALOG,
        },
    }))
}
