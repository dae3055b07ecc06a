//! Route definitions for the curated profile set.
//!
//! ```text
//! GET    /            get_profile_photos
//! PUT    /            set_profile_photos
//! POST   /toggle      toggle_profile_photo
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::profile_photos;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(profile_photos::get_profile_photos).put(profile_photos::set_profile_photos),
        )
        .route("/toggle", post(profile_photos::toggle_profile_photo))
}
