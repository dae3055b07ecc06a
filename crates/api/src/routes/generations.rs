//! Route definitions for full generation batches.
//!
//! ```text
//! POST   /            start_generation
//! GET    /            list_generations
//! GET    /status      generation_status
//! GET    /{id}        poll_generation
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(generations::start_generation).get(generations::list_generations),
        )
        .route("/status", get(generations::generation_status))
        .route("/{id}", get(generations::poll_generation))
}
