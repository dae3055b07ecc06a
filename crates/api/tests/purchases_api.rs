//! HTTP-level tests for purchase validation, the checkout webhook, and the
//! checkout long-poll.

mod common;

use aurapix_core::signature::signature_header;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_json, expect_data, get_auth, post_json_auth, token_for, PRODUCT_ID, WEBHOOK_SECRET};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

fn receipt(transaction_id: &str, receipt: &str) -> serde_json::Value {
    json!({
        "platform": "ios",
        "receipt": receipt,
        "productId": PRODUCT_ID,
        "transactionId": transaction_id
    })
}

fn paid_session(session_id: &str, subject: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "client_reference_id": subject,
                "payment_status": "paid"
            }
        }
    }))
    .unwrap()
}

fn webhook_request(payload: Vec<u8>, secret: &str) -> Request<Body> {
    let header = signature_header(secret, chrono::Utc::now().timestamp(), &payload);
    Request::post("/api/v1/webhooks/checkout")
        .header("content-type", "application/json")
        .header("checkout-signature", header)
        .body(Body::from(payload))
        .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_validate_purchase_grants_access(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for("buyer");

    let before = expect_data(
        get_auth(app.router.clone(), "/api/v1/purchases/access", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(before["hasAccess"], false);

    let result = expect_data(
        post_json_auth(
            app.router.clone(),
            "/api/v1/purchases/validate",
            receipt("tx-100", "good-receipt"),
            &token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(result["valid"], true);
    let credit_id = result["paymentId"].clone();

    let after = expect_data(
        get_auth(app.router.clone(), "/api/v1/purchases/access", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(after["hasAccess"], true);
    assert_eq!(after["paymentId"], credit_id);

    let ledger = expect_data(
        get_auth(app.router, "/api/v1/purchases", &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(ledger.as_array().unwrap().len(), 1);
    assert_eq!(ledger[0]["store"], "app_store");
    assert_eq!(ledger[0]["status"], "unredeemed");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_rejected_receipt_reports_reason(pool: PgPool) {
    let app = common::build_test_app(pool);
    let result = expect_data(
        post_json_auth(
            app.router,
            "/api/v1/purchases/validate",
            receipt("tx-101", "bad-receipt"),
            &token_for("refused"),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(result["valid"], false);
    assert!(result["paymentId"].is_null());
    assert_eq!(result["reason"], "Receipt is not valid");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_platform_is_400(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = receipt("tx-102", "good-receipt");
    body["platform"] = json!("windows_store");

    let response = post_json_auth(
        app.router,
        "/api/v1/purchases/validate",
        body,
        &token_for("someone"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_transaction_claimed_by_another_account_is_409(pool: PgPool) {
    let app = common::build_test_app(pool);
    let first = post_json_auth(
        app.router.clone(),
        "/api/v1/purchases/validate",
        receipt("tx-shared", "good-receipt"),
        &token_for("alice"),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_json_auth(
        app.router,
        "/api/v1/purchases/validate",
        receipt("tx-shared", "good-receipt"),
        &token_for("bob"),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_signed_webhook_then_wait_reports_credit(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = app
        .router
        .clone()
        .oneshot(webhook_request(paid_session("cs_live_1", "web-buyer"), WEBHOOK_SECRET))
        .await
        .unwrap();
    let receipt = expect_data(response, StatusCode::OK).await;
    assert_eq!(receipt["received"], true);
    assert!(receipt["paymentId"].is_i64());

    let status = expect_data(
        get_auth(
            app.router,
            "/api/v1/purchases/checkout/cs_live_1/wait",
            &token_for("web-buyer"),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(status["status"], "credited");
    assert_eq!(status["paymentId"], receipt["paymentId"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_wait_resolves_when_webhook_arrives(pool: PgPool) {
    let app = common::build_test_app(pool);
    let token = token_for("patient");

    let waiter = tokio::spawn({
        let router = app.router.clone();
        async move {
            get_auth(
                router,
                "/api/v1/purchases/checkout/cs_live_2/wait?timeoutSecs=2",
                &token,
            )
            .await
        }
    });
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let response = app
        .router
        .oneshot(webhook_request(paid_session("cs_live_2", "patient"), WEBHOOK_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = expect_data(waiter.await.unwrap(), StatusCode::OK).await;
    assert_eq!(status["status"], "credited");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_wait_without_webhook_is_pending(pool: PgPool) {
    let app = common::build_test_app(pool);
    let status = expect_data(
        get_auth(
            app.router,
            "/api/v1/purchases/checkout/cs_never/wait?timeoutSecs=0",
            &token_for("impatient"),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(status["status"], "pending");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_webhook_with_wrong_signature_is_401(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = app
        .router
        .oneshot(webhook_request(paid_session("cs_live_3", "mallory"), "whsec_wrong"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}
