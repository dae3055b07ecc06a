#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use aurapix_core::credit::PurchaseStore;
use aurapix_core::generation::{
    GeneratedOutput, GenerationKind, GenerationRequest, GenerationService, GenerationServiceError, JobSnapshot,
    RemoteJobState,
};
use aurapix_core::photo::Verdict;
use aurapix_core::purchase::{PurchaseClaim, PurchaseError, PurchaseVerdict, PurchaseVerifier};
use aurapix_core::retry::RetryPolicy;
use aurapix_core::storage::{ObjectMeta, ObjectStorage, PresignedUrl, StorageError};
use aurapix_core::types::DbId;
use aurapix_core::vision::{ImageRef, VisionClient, VisionError};
use aurapix_db::repositories::AccountRepo;
use aurapix_pipeline::photos::UploadRequest;
use aurapix_pipeline::views::PhotoView;
use aurapix_pipeline::{Pipeline, PipelineDeps, PipelineSettings};
use sqlx::PgPool;

pub const PRODUCT_ID: &str = "profile_pack";
pub const WEBHOOK_SECRET: &str = "whsec_test";

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// In-memory object storage. `head` only sees keys marked as uploaded.
#[derive(Default)]
pub struct FakeStorage {
    uploaded: Mutex<HashMap<String, i64>>,
}

impl FakeStorage {
    pub fn mark_uploaded(&self, key: &str, size_bytes: i64) {
        self.uploaded
            .lock()
            .unwrap()
            .insert(key.to_string(), size_bytes);
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
        Ok(url(key, "put", expires_in))
    }

    async fn presign_download(&self, key: &str, expires_in: Duration) -> Result<PresignedUrl, StorageError> {
        Ok(url(key, "get", expires_in))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Ok(self.uploaded.lock().unwrap().get(key).map(|&size_bytes| ObjectMeta {
            size_bytes,
            content_type: Some("image/jpeg".to_string()),
        }))
    }
}

fn url(key: &str, op: &str, expires_in: Duration) -> PresignedUrl {
    PresignedUrl {
        url: format!("https://storage.test/{key}?op={op}"),
        expires_at: chrono::Utc::now() + chrono::Duration::from_std(expires_in).unwrap(),
    }
}

/// Vision check answering every call with the configured verdict.
pub struct FakeVision {
    verdict: Mutex<Verdict>,
    unavailable: AtomicBool,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl Default for FakeVision {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Verdict::new(true, Vec::new())),
            unavailable: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeVision {
    pub fn answer(&self, verdict: Verdict) {
        *self.verdict.lock().unwrap() = verdict;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every check take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClient for FakeVision {
    async fn check(&self, _image: &ImageRef) -> Result<Verdict, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VisionError::Unavailable("connection refused".into()));
        }
        Ok(self.verdict.lock().unwrap().clone())
    }
}

/// Generation service whose jobs run until a test finishes them.
#[derive(Default)]
pub struct FakeGenerator {
    submitted: Mutex<Vec<(String, GenerationRequest)>>,
    snapshots: Mutex<HashMap<String, JobSnapshot>>,
    reject_submissions: AtomicBool,
}

impl FakeGenerator {
    pub fn reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<(String, GenerationRequest)> {
        self.submitted.lock().unwrap().clone()
    }

    /// External id of the latest job submitted for a sample or batch.
    pub fn job_for(&self, kind: GenerationKind, reference_id: DbId) -> String {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, r)| r.kind == kind && r.reference_id == reference_id)
            .map(|(id, _)| id.clone())
            .expect("no job submitted for reference")
    }

    /// Finish a job with one image per listed scenario.
    pub fn succeed(&self, external_job_id: &str, scenarios: &[&str]) {
        let outputs = scenarios
            .iter()
            .enumerate()
            .map(|(i, s)| GeneratedOutput {
                scenario: s.to_string(),
                storage_key: format!("generated/{external_job_id}/{i}-{s}.jpg"),
            })
            .collect();
        self.snapshots.lock().unwrap().insert(
            external_job_id.to_string(),
            JobSnapshot {
                state: RemoteJobState::Succeeded,
                outputs,
                error: None,
            },
        );
    }

    pub fn fail(&self, external_job_id: &str, error: &str) {
        self.snapshots.lock().unwrap().insert(
            external_job_id.to_string(),
            JobSnapshot {
                state: RemoteJobState::Failed,
                outputs: Vec::new(),
                error: Some(error.to_string()),
            },
        );
    }
}

#[async_trait]
impl GenerationService for FakeGenerator {
    async fn submit(&self, request: &GenerationRequest) -> Result<String, GenerationServiceError> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(GenerationServiceError::Rejected {
                status: 422,
                body: "unsupported source images".into(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        let id = format!("job-{}", submitted.len() + 1);
        submitted.push((id.clone(), request.clone()));
        Ok(id)
    }

    async fn fetch(&self, external_job_id: &str) -> Result<JobSnapshot, GenerationServiceError> {
        Ok(self
            .snapshots
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

/// Store verifier accepting every transaction not marked as rejected.
#[derive(Default)]
pub struct FakeVerifier {
    rejected: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn reject(&self, transaction_id: &str) {
        self.rejected
            .lock()
            .unwrap()
            .insert(transaction_id.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PurchaseVerifier for FakeVerifier {
    async fn verify(&self, claim: &PurchaseClaim) -> Result<PurchaseVerdict, PurchaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.lock().unwrap().contains(&claim.transaction_id) {
            return Ok(PurchaseVerdict::rejected("Receipt is not valid"));
        }
        Ok(PurchaseVerdict::accepted(claim.product_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub pool: PgPool,
    pub pipeline: Pipeline,
    pub storage: Arc<FakeStorage>,
    pub vision: Arc<FakeVision>,
    pub generator: Arc<FakeGenerator>,
    pub verifier: Arc<FakeVerifier>,
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        vision_timeout: Duration::from_secs(2),
        vision_retry: RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        },
        product_id: PRODUCT_ID.to_string(),
        checkout_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..PipelineSettings::default()
    }
}

pub fn harness(pool: PgPool) -> Harness {
    harness_with(pool, test_settings())
}

pub fn harness_with(pool: PgPool, settings: PipelineSettings) -> Harness {
    let storage = Arc::new(FakeStorage::default());
    let vision = Arc::new(FakeVision::default());
    let generator = Arc::new(FakeGenerator::default());
    let verifier = Arc::new(FakeVerifier::default());
    let pipeline = Pipeline::new(
        pool.clone(),
        PipelineDeps {
            storage: storage.clone(),
            vision: vision.clone(),
            generator: generator.clone(),
            verifier: verifier.clone(),
        },
        settings,
    );
    Harness {
        pool,
        pipeline,
        storage,
        vision,
        generator,
        verifier,
    }
}

impl Harness {
    pub async fn owner(&self, subject: &str) -> DbId {
        AccountRepo::find_or_create(&self.pool, subject)
            .await
            .unwrap()
            .id
    }

    /// Request a slot, "upload" to it, and confirm it.
    pub async fn upload_photo(&self, owner_id: DbId) -> PhotoView {
        let slot = self
            .pipeline
            .photos
            .request_upload_slot(owner_id, &jpeg_upload(None))
            .await
            .unwrap();
        self.storage.mark_uploaded(&slot.storage_key, 1024);
        self.pipeline
            .photos
            .confirm_upload(owner_id, &slot.storage_key)
            .await
            .unwrap()
    }

    /// Upload and validate `count` photos so the owner can proceed.
    pub async fn ready_owner(&self, subject: &str, count: usize) -> DbId {
        let owner_id = self.owner(subject).await;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.upload_photo(owner_id).await.id);
        }
        for id in ids {
            self.pipeline.photos.validate(owner_id, id).await.unwrap();
        }
        owner_id
    }

    /// Record a credit for a store purchase and return its id.
    pub async fn buy(&self, owner_id: DbId, transaction_id: &str) -> DbId {
        self.pipeline
            .credits
            .validate_external_purchase(owner_id, &claim(transaction_id))
            .await
            .unwrap()
            .credit_id
            .expect("purchase should be credited")
    }
}

pub fn jpeg_upload(replaces_photo_id: Option<DbId>) -> UploadRequest {
    UploadRequest {
        file_name: "selfie.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        size_bytes: 1024,
        replaces_photo_id,
    }
}

pub fn claim(transaction_id: &str) -> PurchaseClaim {
    PurchaseClaim {
        store: PurchaseStore::AppStore,
        receipt: format!("receipt-{transaction_id}"),
        product_id: PRODUCT_ID.to_string(),
        transaction_id: transaction_id.to_string(),
    }
}

pub const FULL_SCENARIOS: [&str; 6] = [
    "studio",
    "outdoor_golden_hour",
    "business",
    "casual_cafe",
    "city_street",
    "beach_sunset",
];

pub fn full_scenarios() -> Vec<String> {
    FULL_SCENARIOS.iter().map(|s| s.to_string()).collect()
}
