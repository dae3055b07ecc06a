#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aurapix_core::generation::{
    GeneratedOutput, GenerationRequest, GenerationService, GenerationServiceError, JobSnapshot,
    RemoteJobState,
};
use aurapix_core::photo::Verdict;
use aurapix_core::purchase::{PurchaseClaim, PurchaseError, PurchaseVerdict, PurchaseVerifier};
use aurapix_core::retry::RetryPolicy;
use aurapix_core::storage::{ObjectMeta, ObjectStorage, PresignedUrl, StorageError};
use aurapix_core::vision::{ImageRef, VisionClient, VisionError};
use aurapix_pipeline::{Pipeline, PipelineDeps, PipelineSettings};
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::PgPool;
use tower::ServiceExt;

use aurapix_api::auth::jwt::{Claims, JwtConfig};
use aurapix_api::config::ServerConfig;
use aurapix_api::router::build_app_router;
use aurapix_api::state::AppState;

pub const JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
pub const WEBHOOK_SECRET: &str = "whsec_api_test";
pub const PRODUCT_ID: &str = "profile_pack";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStorage {
    uploaded: Mutex<HashMap<String, i64>>,
}

impl FakeStorage {
    pub fn mark_uploaded(&self, key: &str) {
        self.uploaded.lock().unwrap().insert(key.to_string(), 2048);
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn presign_upload(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        Ok(presigned(key, expires_in))
    }

    async fn presign_download(&self, key: &str, expires_in: Duration) -> Result<PresignedUrl, StorageError> {
        Ok(presigned(key, expires_in))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Ok(self.uploaded.lock().unwrap().get(key).map(|&size_bytes| ObjectMeta {
            size_bytes,
            content_type: Some("image/jpeg".to_string()),
        }))
    }
}

fn presigned(key: &str, expires_in: Duration) -> PresignedUrl {
    PresignedUrl {
        url: format!("https://storage.test/{key}"),
        expires_at: chrono::Utc::now() + chrono::Duration::from_std(expires_in).unwrap(),
    }
}

/// Vision check that accepts every photo.
pub struct AcceptingVision;

#[async_trait]
impl VisionClient for AcceptingVision {
    async fn check(&self, _image: &ImageRef) -> Result<Verdict, VisionError> {
        Ok(Verdict::new(true, Vec::new()))
    }
}

/// Generation service whose jobs run until a test finishes them.
#[derive(Default)]
pub struct FakeGenerator {
    submitted: Mutex<Vec<(String, GenerationRequest)>>,
    finished: Mutex<HashMap<String, JobSnapshot>>,
}

impl FakeGenerator {
    /// Finish the latest submitted job with one image per requested scenario.
    pub fn finish_latest(&self) {
        let submitted = self.submitted.lock().unwrap();
        let (id, request) = submitted.last().expect("no job submitted");
        let outputs = request
            .scenarios
            .iter()
            .map(|s| GeneratedOutput {
                scenario: s.clone(),
                storage_key: format!("generated/{id}/{s}.jpg"),
            })
            .collect();
        self.finished.lock().unwrap().insert(
            id.clone(),
            JobSnapshot {
                state: RemoteJobState::Succeeded,
                outputs,
                error: None,
            },
        );
    }
}

#[async_trait]
impl GenerationService for FakeGenerator {
    async fn submit(&self, request: &GenerationRequest) -> Result<String, GenerationServiceError> {
        let mut submitted = self.submitted.lock().unwrap();
        let id = format!("job-{}", submitted.len() + 1);
        submitted.push((id.clone(), request.clone()));
        Ok(id)
    }

    async fn fetch(&self, external_job_id: &str) -> Result<JobSnapshot, GenerationServiceError> {
        Ok(self
            .finished
            .lock()
            .unwrap()
            .get(external_job_id)
            .cloned()
            .unwrap_or(JobSnapshot {
                state: RemoteJobState::Running,
                outputs: Vec::new(),
                error: None,
            }))
    }
}

/// Store verifier accepting every receipt except `"bad-receipt"`.
pub struct FakeVerifier;

#[async_trait]
impl PurchaseVerifier for FakeVerifier {
    async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError> {
        if claim.receipt == "bad-receipt" {
            return Ok(PurchaseVerdict::rejected("Receipt is not valid"));
        }
        Ok(PurchaseVerdict::accepted(claim.product_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        checkout_wait_max_secs: 2,
        database_url: String::new(),
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            issuer: None,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<FakeStorage>,
    pub generator: Arc<FakeGenerator>,
}

/// Build the full application router, middleware included, over fakes.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let storage = Arc::new(FakeStorage::default());
    let generator = Arc::new(FakeGenerator::default());
    let settings = PipelineSettings {
        vision_retry: RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        },
        product_id: PRODUCT_ID.to_string(),
        checkout_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..PipelineSettings::default()
    };
    let pipeline = Pipeline::new(
        pool.clone(),
        PipelineDeps {
            storage: storage.clone(),
            vision: Arc::new(AcceptingVision),
            generator: generator.clone(),
            verifier: Arc::new(FakeVerifier),
        },
        settings,
    );

    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        pipeline,
    };
    TestApp {
        router: build_app_router(state, &config),
        storage,
        generator,
    }
}

/// A valid bearer token for `subject`.
pub fn token_for(subject: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: subject.to_string(),
        exp: now + 600,
        iat: now,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json_auth(
    app: Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json_auth(app, "POST", uri, body, token).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the status and return the `data` field of the envelope.
pub async fn expect_data(response: Response<Body>, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await["data"].clone()
}

/// Request a slot, "upload" to it, confirm, and validate. Returns the photo id.
pub async fn upload_valid_photo(app: &TestApp, token: &str) -> i64 {
    let slot = expect_data(
        post_json_auth(
            app.router.clone(),
            "/api/v1/photos/upload-slots",
            serde_json::json!({
                "fileName": "selfie.jpg",
                "contentType": "image/jpeg",
                "sizeBytes": 2048
            }),
            token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let key = slot["storageKey"].as_str().unwrap().to_string();
    app.storage.mark_uploaded(&key);

    let photo = expect_data(
        post_json_auth(
            app.router.clone(),
            "/api/v1/photos",
            serde_json::json!({ "storageKey": key }),
            token,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    let id = photo["id"].as_i64().unwrap();

    let result = expect_data(
        post_json_auth(
            app.router.clone(),
            &format!("/api/v1/photos/{id}/validate"),
            serde_json::json!({}),
            token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(result["isValid"], true);
    id
}
