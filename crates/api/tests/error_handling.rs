//! Tests for `AppError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly; no server or database is needed.

use aurapix_api::error::AppError;
use aurapix_core::error::CoreError;
use aurapix_pipeline::error::PipelineError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Photo",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Photo with id 42 not found");
}

#[tokio::test]
async fn unknown_storage_key_returns_404() {
    let err = AppError::Core(CoreError::UnknownStorageKey("photos/1/x.jpg".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "UNKNOWN_STORAGE_KEY");
}

#[tokio::test]
async fn quota_exceeded_returns_429() {
    let err = AppError::Core(CoreError::QuotaExceeded {
        active: 10,
        in_flight: 0,
        limit: 10,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "QUOTA_EXCEEDED");
}

#[tokio::test]
async fn state_conflicts_return_409() {
    let in_progress = AppError::Core(CoreError::AlreadyInProgress { photo_id: 3 });
    let transition = AppError::Core(CoreError::InvalidStateTransition {
        entity: "Photo",
        id: 3,
        from: "validated",
        to: "bypassed",
    });

    let (status, json) = error_to_response(in_progress).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_IN_PROGRESS");

    let (status, json) = error_to_response(transition).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn missing_credit_returns_402() {
    let (status, json) = error_to_response(AppError::Core(CoreError::CreditNotAvailable)).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["code"], "CREDIT_NOT_AVAILABLE");
}

#[tokio::test]
async fn redeemed_credit_hints_at_a_running_generation() {
    let err = AppError::Core(CoreError::CreditAlreadyRedeemed { credit_id: 9 });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CREDIT_ALREADY_REDEEMED");
    assert_eq!(json["error"], "You may already have started a generation");
}

#[tokio::test]
async fn external_timeout_returns_504_without_detail() {
    let err = AppError::Core(CoreError::ExternalServiceTimeout {
        service: "vision",
        detail: "connect to 10.0.0.7:443 timed out".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["code"], "EXTERNAL_SERVICE_TIMEOUT");
    assert!(!json["error"].as_str().unwrap().contains("10.0.0.7"));
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("invalid field value".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "invalid field value");
}

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("secret database credentials leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn pipeline_errors_keep_their_mapping() {
    let core = AppError::from(PipelineError::Core(CoreError::Validation("bad".into())));
    let db = AppError::from(PipelineError::Database(sqlx::Error::RowNotFound));

    let (status, json) = error_to_response(core).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");

    let (status, _) = error_to_response(db).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
