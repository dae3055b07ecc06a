//! Route definitions for source photos.
//!
//! ```text
//! POST   /upload-slots        request_upload_slot
//! POST   /                    confirm_upload
//! GET    /                    list_photos
//! GET    /progress            get_progress
//! GET    /{id}                get_photo
//! POST   /{id}/validate       validate_photo
//! POST   /{id}/bypass         bypass_photo
//! POST   /{id}/replace        replace_photo
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::photos;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload-slots", post(photos::request_upload_slot))
        .route("/", post(photos::confirm_upload).get(photos::list_photos))
        .route("/progress", get(photos::get_progress))
        .route("/{id}", get(photos::get_photo))
        .route("/{id}/validate", post(photos::validate_photo))
        .route("/{id}/bypass", post(photos::bypass_photo))
        .route("/{id}/replace", post(photos::replace_photo))
}
