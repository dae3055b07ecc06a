//! Handlers for the curated profile set.

use aurapix_core::curation::ProfileSelection;
use aurapix_core::types::DbId;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSelectionRequest {
    /// The complete new selection; empty clears it.
    pub selections: Vec<ProfileSelection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub generated_image_id: DbId,
    pub order: Option<i16>,
}

/// GET /api/v1/profile-photos
pub async fn get_profile_photos(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let images = state.pipeline.curation.profile_photos(auth.owner_id).await?;
    Ok(Json(DataResponse { data: images }))
}

/// PUT /api/v1/profile-photos
pub async fn set_profile_photos(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SetSelectionRequest>,
) -> AppResult<impl IntoResponse> {
    let images = state
        .pipeline
        .curation
        .set_selection(auth.owner_id, &input.selections)
        .await?;
    Ok(Json(DataResponse { data: images }))
}

/// POST /api/v1/profile-photos/toggle
pub async fn toggle_profile_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ToggleRequest>,
) -> AppResult<impl IntoResponse> {
    let images = state
        .pipeline
        .curation
        .toggle(auth.owner_id, input.generated_image_id, input.order)
        .await?;
    Ok(Json(DataResponse { data: images }))
}
