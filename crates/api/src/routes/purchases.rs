//! Route definitions for purchase credits.
//!
//! ```text
//! GET    /                        list_credits
//! GET    /access                  check_access
//! POST   /validate                validate_purchase
//! GET    /checkout/{id}/wait      wait_for_checkout
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::purchases;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(purchases::list_credits))
        .route("/access", get(purchases::check_access))
        .route("/validate", post(purchases::validate_purchase))
        .route("/checkout/{id}/wait", get(purchases::wait_for_checkout))
}

/// Store webhooks. Authenticated by signature, not bearer token.
///
/// ```text
/// POST   /checkout                checkout_webhook
/// ```
pub fn webhook_router() -> Router<AppState> {
    Router::new().route("/checkout", post(purchases::checkout_webhook))
}
