//! HTTP-level tests for the photo endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, expect_data, get_auth, post_json_auth, token_for, upload_valid_photo};
use serde_json::json;
use sqlx::PgPool;

fn slot_body() -> serde_json::Value {
    json!({ "fileName": "me.png", "contentType": "image/png", "sizeBytes": 4096 })
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_confirm_validate_flow(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for("flow-user");

    let photo_id = upload_valid_photo(&app, &token).await;

    let photo = expect_data(
        get_auth(app.router.clone(), &format!("/api/v1/photos/{photo_id}"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(photo["status"], "validated");

    let progress = expect_data(
        get_auth(app.router.clone(), "/api/v1/photos/progress", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(progress["validated"], 1);
    assert_eq!(progress["canProceed"], true);

    let photos = expect_data(
        get_auth(app.router, "/api/v1/photos", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(photos.as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unsupported_content_type_is_400(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app.router,
        "/api/v1/photos/upload-slots",
        json!({ "fileName": "clip.gif", "contentType": "image/gif", "sizeBytes": 100 }),
        &token_for("gif-user"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_eleventh_slot_is_429(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for("greedy");

    for _ in 0..10 {
        let response =
            post_json_auth(app.router.clone(), "/api/v1/photos/upload-slots", slot_body(), &token)
                .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let response =
        post_json_auth(app.router, "/api/v1/photos/upload-slots", slot_body(), &token).await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "QUOTA_EXCEEDED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_confirming_unknown_key_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app.router,
        "/api/v1/photos",
        json!({ "storageKey": "photos/1/never-issued.jpg" }),
        &token_for("guesser"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "UNKNOWN_STORAGE_KEY");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_other_owners_photo_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let photo_id = upload_valid_photo(&app, &token_for("alice")).await;

    let response = get_auth(
        app.router,
        &format!("/api/v1/photos/{photo_id}"),
        &token_for("bob"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bypassing_validated_photo_is_409(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for("bypasser");
    let photo_id = upload_valid_photo(&app, &token).await;

    let response = post_json_auth(
        app.router,
        &format!("/api/v1/photos/{photo_id}/bypass"),
        json!({}),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_STATE_TRANSITION");
}
