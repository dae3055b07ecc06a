//! Liveness for load balancers and a quick look at the purchase plumbing.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether signed hosted-checkout webhooks can be verified.
    pub checkout_webhooks: bool,
    /// Clients currently long-polling for a checkout confirmation.
    pub checkout_waiters: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = aurapix_db::health_check(&state.pool).await.is_ok();
    let credits = &state.pipeline.credits;

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        checkout_webhooks: credits.accepts_checkout_webhooks(),
        checkout_waiters: credits.listeners().pending_count(),
    })
}

/// Mounted at the root, outside `/api/v1` and without authentication.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
