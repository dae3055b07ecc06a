//! Handlers for the source-photo lifecycle.
//!
//! Clients upload directly to storage through a presigned slot, then
//! confirm the upload here. Validation, bypass, and replacement act on one
//! owned photo at a time.

use aurapix_core::types::DbId;
use aurapix_pipeline::photos::UploadRequest;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `confirm` and `replace`: the key of an uploaded object.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageKeyRequest {
    pub storage_key: String,
}

/// POST /api/v1/photos/upload-slots
pub async fn request_upload_slot(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UploadRequest>,
) -> AppResult<impl IntoResponse> {
    let slot = state
        .pipeline
        .photos
        .request_upload_slot(auth.owner_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: slot })))
}

/// POST /api/v1/photos
///
/// Record the object uploaded to a slot as a pending photo. Repeating the
/// call for the same key returns the same photo.
pub async fn confirm_upload(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<StorageKeyRequest>,
) -> AppResult<impl IntoResponse> {
    let photo = state
        .pipeline
        .photos
        .confirm_upload(auth.owner_id, &input.storage_key)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: photo })))
}

/// GET /api/v1/photos
pub async fn list_photos(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let photos = state.pipeline.photos.list(auth.owner_id).await?;
    Ok(Json(DataResponse { data: photos }))
}

/// GET /api/v1/photos/progress
pub async fn get_progress(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let progress = state.pipeline.photos.progress(auth.owner_id).await?;
    Ok(Json(DataResponse { data: progress }))
}

/// GET /api/v1/photos/{id}
pub async fn get_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let photo = state.pipeline.photos.get(auth.owner_id, photo_id).await?;
    Ok(Json(DataResponse { data: photo }))
}

/// POST /api/v1/photos/{id}/validate
pub async fn validate_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let result = state
        .pipeline
        .photos
        .validate(auth.owner_id, photo_id)
        .await?;
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/photos/{id}/bypass
pub async fn bypass_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let result = state.pipeline.photos.bypass(auth.owner_id, photo_id).await?;
    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/photos/{id}/replace
///
/// Retires the photo in favour of the uploaded replacement. The new
/// photo's validation runs in the background.
pub async fn replace_photo(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
    Json(input): Json<StorageKeyRequest>,
) -> AppResult<impl IntoResponse> {
    let photo = state
        .pipeline
        .photos
        .replace(auth.owner_id, photo_id, &input.storage_key)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: photo })))
}
