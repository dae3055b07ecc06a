//! Read models returned by the services.
//!
//! These are what the HTTP layer serializes; field names are camelCase.

use aurapix_core::credit::PurchaseStore;
use aurapix_core::error::CoreError;
use aurapix_core::photo::WarningKind;
use aurapix_core::status::{BatchStatus, CreditStatus, PhotoStatus, SampleJobStatus};
use aurapix_core::storage::PresignedUrl;
use aurapix_core::types::{DbId, Timestamp};
use aurapix_db::models::batch::Batch;
use aurapix_db::models::credit::PurchaseCredit;
use aurapix_db::models::photo::Photo;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoView {
    pub id: DbId,
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: PhotoStatus,
    pub warnings: Vec<WarningKind>,
    pub retired: bool,
    pub replaced_by_photo_id: Option<DbId>,
    pub validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TryFrom<&Photo> for PhotoView {
    type Error = CoreError;

    fn try_from(photo: &Photo) -> Result<Self, Self::Error> {
        Ok(Self {
            id: photo.id,
            storage_key: photo.storage_key.clone(),
            file_name: photo.file_name.clone(),
            content_type: photo.content_type.clone(),
            size_bytes: photo.size_bytes,
            status: photo.status()?,
            warnings: photo.warning_kinds(),
            retired: photo.is_retired(),
            replaced_by_photo_id: photo.replaced_by_photo_id,
            validated_at: photo.validated_at,
            created_at: photo.created_at,
        })
    }
}

/// A freshly issued upload location.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlotView {
    pub slot_id: DbId,
    pub storage_key: String,
    pub upload_url: String,
    pub expires_at: Timestamp,
    pub replaces_photo_id: Option<DbId>,
}

/// Response of `validate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub photo_id: DbId,
    pub is_valid: bool,
    pub warnings: Vec<WarningKind>,
    pub status: PhotoStatus,
    /// True only when this call created a new sample job.
    pub sample_generation_started: bool,
}

/// Response of `bypass`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassResult {
    #[serde(flatten)]
    pub photo: PhotoView,
    pub sample_generation_started: bool,
}

/// A generated or preview image with a download URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: DbId,
    pub scenario: String,
    pub url: String,
    pub url_expires_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_profile_order: Option<i16>,
}

impl ImageView {
    pub fn new(id: DbId, scenario: &str, url: PresignedUrl, selected_profile_order: Option<i16>) -> Self {
        Self {
            id,
            scenario: scenario.to_string(),
            url: url.url,
            url_expires_at: url.expires_at,
            selected_profile_order,
        }
    }
}

/// Response of `startSample`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleStart {
    pub sample_job_id: DbId,
    pub status: SampleJobStatus,
    /// False when an existing job for the same photo set was reused.
    pub started: bool,
}

/// Response of `pollSample`. `images` is empty until the job completes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePoll {
    pub sample_job_id: Option<DbId>,
    pub status: Option<SampleJobStatus>,
    pub done: bool,
    pub images: Vec<ImageView>,
}

impl SamplePoll {
    pub fn none() -> Self {
        Self {
            sample_job_id: None,
            status: None,
            done: false,
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub id: DbId,
    pub status: BatchStatus,
    pub partial: bool,
    pub scenarios: Vec<String>,
    pub credit_id: DbId,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub images: Vec<ImageView>,
}

impl BatchView {
    pub fn new(batch: &Batch, images: Vec<ImageView>) -> Result<Self, CoreError> {
        Ok(Self {
            id: batch.id,
            status: batch.status()?,
            partial: batch.partial,
            scenarios: batch.scenarios.clone(),
            credit_id: batch.credit_id,
            error_message: batch.error_message.clone(),
            created_at: batch.created_at,
            completed_at: batch.completed_at,
            images,
        })
    }
}

/// Response of `checkGenerationStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub is_generating: bool,
    pub batch_id: Option<DbId>,
}

/// Response of `validateExternalPurchase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseValidation {
    pub valid: bool,
    #[serde(rename = "paymentId")]
    pub credit_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PurchaseValidation {
    pub fn credited(credit_id: DbId) -> Self {
        Self {
            valid: true,
            credit_id: Some(credit_id),
            reason: None,
        }
    }

    pub fn rejected(reason: String) -> Self {
        Self {
            valid: false,
            credit_id: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditView {
    pub id: DbId,
    pub store: PurchaseStore,
    pub product_id: String,
    pub external_transaction_id: String,
    pub status: CreditStatus,
    pub batch_id: Option<DbId>,
    pub created_at: Timestamp,
    pub redeemed_at: Option<Timestamp>,
}

impl TryFrom<&PurchaseCredit> for CreditView {
    type Error = CoreError;

    fn try_from(credit: &PurchaseCredit) -> Result<Self, Self::Error> {
        Ok(Self {
            id: credit.id,
            store: PurchaseStore::parse(&credit.store)?,
            product_id: credit.product_id.clone(),
            external_transaction_id: credit.external_transaction_id.clone(),
            status: credit.status()?,
            batch_id: credit.batch_id,
            created_at: credit.created_at,
            redeemed_at: credit.redeemed_at,
        })
    }
}
