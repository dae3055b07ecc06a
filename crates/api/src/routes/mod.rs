pub mod generations;
pub mod health;
pub mod photos;
pub mod profile_photos;
pub mod purchases;
pub mod samples;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route except `/webhooks/*` requires a bearer token.
///
/// ```text
/// /photos/upload-slots                 request upload slot (POST)
/// /photos                              confirm upload (POST), list (GET)
/// /photos/progress                     counts and canProceed
/// /photos/{id}                         get
/// /photos/{id}/validate                run the vision check (POST)
/// /photos/{id}/bypass                  accept a failed photo (POST)
/// /photos/{id}/replace                 swap in a new upload (POST)
///
/// /samples                             start (POST), poll (GET)
/// /scenarios                           scenario catalog
///
/// /purchases                           credit ledger
/// /purchases/access                    has an unredeemed credit?
/// /purchases/validate                  verify a store receipt (POST)
/// /purchases/checkout/{id}/wait        long-poll a checkout session
///
/// /webhooks/checkout                   hosted-checkout webhook (POST)
///
/// /generations                         start (POST), list (GET)
/// /generations/status                  in-flight batch
/// /generations/{id}                    poll one batch
///
/// /profile-photos                      get (GET), replace selection (PUT)
/// /profile-photos/toggle               toggle one image (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/photos", photos::router())
        .nest("/samples", samples::router())
        .route("/scenarios", get(handlers::samples::list_scenarios))
        .nest("/purchases", purchases::router())
        .nest("/webhooks", purchases::webhook_router())
        .nest("/generations", generations::router())
        .nest("/profile-photos", profile_photos::router())
}
