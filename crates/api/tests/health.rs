//! Health check, middleware, and authentication behaviour.

mod common;

use aurapix_api::auth::jwt::Claims;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, get_auth, token_for};
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::PgPool;
use tower::ServiceExt;

#[sqlx::test(migrations = "../../db/migrations")]
async fn health_check_returns_ok_with_json(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["checkout_webhooks"], true);
    assert_eq!(json["checkout_waiters"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_route_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.router, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn response_contains_x_request_id_header(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.router, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36, "x-request-id should be a UUID string");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cors_preflight_allows_configured_origin(pool: PgPool) {
    let app = common::build_test_app(pool);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/photos")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_token_is_unauthorized(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.router, "/api/v1/photos").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn token_signed_with_another_secret_is_unauthorized(pool: PgPool) {
    let app = common::build_test_app(pool);
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: "mallory".to_string(),
        exp: now + 600,
        iat: now,
        iss: None,
    };
    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"not-the-server-secret"),
    )
    .unwrap();

    let response = get_auth(app.router, "/api/v1/photos", &forged).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn webhook_does_not_require_a_token(pool: PgPool) {
    let app = common::build_test_app(pool);
    let request = Request::post("/api/v1/webhooks/checkout")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    // Rejected for the missing signature, not the missing bearer token.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing Checkout-Signature header");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn first_request_creates_the_owner_account(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = get_auth(app.router, "/api/v1/photos", &token_for("newcomer")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], serde_json::json!([]));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE subject = $1")
        .bind("newcomer")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
