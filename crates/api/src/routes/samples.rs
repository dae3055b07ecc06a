//! Route definitions for preview samples.
//!
//! ```text
//! POST   /        start_sample
//! GET    /        poll_sample
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::samples;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(samples::start_sample).get(samples::poll_sample))
}
