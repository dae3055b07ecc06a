//! Photo-to-profile-set pipeline services.
//!
//! Ties the domain rules in `aurapix-core` to persistence in `aurapix-db`
//! and to the external collaborators behind the core traits. The API crate
//! holds one [`Pipeline`] in its state and spawns one
//! [`monitor::GenerationMonitor`].

use std::sync::Arc;
use std::time::Duration;

use aurapix_core::generation::GenerationService;
use aurapix_core::purchase::PurchaseVerifier;
use aurapix_core::retry::RetryPolicy;
use aurapix_core::storage::ObjectStorage;
use aurapix_core::vision::VisionClient;
use sqlx::PgPool;

pub mod credits;
pub mod curation;
pub mod error;
pub mod generation;
pub mod listeners;
pub mod monitor;
pub mod photos;
pub mod presign;
pub mod validation;
pub mod views;

use credits::CreditGate;
use curation::CurationService;
use generation::GenerationCoordinator;
use listeners::PurchaseListeners;
use monitor::GenerationMonitor;
use photos::PhotoLifecycle;
use presign::Presigner;
use validation::ValidationEngine;

/// External collaborators.
#[derive(Clone)]
pub struct PipelineDeps {
    pub storage: Arc<dyn ObjectStorage>,
    pub vision: Arc<dyn VisionClient>,
    pub generator: Arc<dyn GenerationService>,
    pub verifier: Arc<dyn PurchaseVerifier>,
}

/// Tunables for the pipeline services.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub upload_url_expiry: Duration,
    pub download_url_expiry: Duration,
    /// Per-attempt limit on the vision check.
    pub vision_timeout: Duration,
    pub vision_retry: RetryPolicy,
    /// A generation job still running after this is finalised with what it has.
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    /// Photos left in `validating` longer than this go back to `pending`.
    pub stale_validation_after: Duration,
    /// The one purchasable product that grants a credit.
    pub product_id: String,
    pub checkout_webhook_secret: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            upload_url_expiry: Duration::from_secs(15 * 60),
            download_url_expiry: Duration::from_secs(60 * 60),
            vision_timeout: Duration::from_secs(30),
            vision_retry: RetryPolicy::default(),
            job_timeout: Duration::from_secs(30 * 60),
            poll_interval: monitor::DEFAULT_POLL_INTERVAL,
            stale_validation_after: Duration::from_secs(5 * 60),
            product_id: "profile_pack".to_string(),
            checkout_webhook_secret: None,
        }
    }
}

/// All pipeline services, cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    pub photos: PhotoLifecycle,
    pub credits: CreditGate,
    pub generation: GenerationCoordinator,
    pub curation: CurationService,
    pool: PgPool,
    settings: Arc<PipelineSettings>,
}

impl Pipeline {
    pub fn new(pool: PgPool, deps: PipelineDeps, settings: PipelineSettings) -> Self {
        let presigner = Presigner::new(deps.storage, settings.download_url_expiry);
        let validator =
            ValidationEngine::new(deps.vision, settings.vision_retry, settings.vision_timeout);
        let credits = CreditGate::new(
            pool.clone(),
            deps.verifier,
            PurchaseListeners::new(),
            settings.product_id.clone(),
            settings.checkout_webhook_secret.clone(),
        );
        let curation = CurationService::new(pool.clone(), presigner.clone());
        let generation = GenerationCoordinator::new(
            pool.clone(),
            deps.generator,
            presigner.clone(),
            credits.clone(),
            curation.clone(),
            settings.job_timeout,
        );
        let photos = PhotoLifecycle::new(
            pool.clone(),
            presigner,
            validator,
            generation.clone(),
            settings.upload_url_expiry,
        );

        Self {
            photos,
            credits,
            generation,
            curation,
            pool,
            settings: Arc::new(settings),
        }
    }

    /// The background monitor for this pipeline. Spawn it once.
    pub fn monitor(&self) -> GenerationMonitor {
        GenerationMonitor::new(
            self.pool.clone(),
            self.generation.clone(),
            self.curation.clone(),
            self.settings.poll_interval,
            self.settings.stale_validation_after,
        )
    }
}
