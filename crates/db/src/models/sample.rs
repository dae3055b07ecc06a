//! Sample (preview) jobs and their images.

use aurapix_core::error::CoreError;
use aurapix_core::status::{SampleJobStatus, StatusId};
use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `sample_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SampleJob {
    pub id: DbId,
    pub owner_id: DbId,
    pub fingerprint: String,
    pub scenarios: Vec<String>,
    pub source_photo_ids: Vec<DbId>,
    pub status_id: StatusId,
    pub external_job_id: Option<String>,
    pub error_message: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SampleJob {
    pub fn status(&self) -> Result<SampleJobStatus, CoreError> {
        SampleJobStatus::from_id(self.status_id)
    }
}

/// DTO for creating a queued sample job.
#[derive(Debug, Clone)]
pub struct CreateSampleJob {
    pub owner_id: DbId,
    pub fingerprint: String,
    pub scenarios: Vec<String>,
    pub source_photo_ids: Vec<DbId>,
}

/// A row from the `sample_images` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SampleImage {
    pub id: DbId,
    pub sample_job_id: DbId,
    pub scenario: String,
    pub storage_key: String,
    pub created_at: Timestamp,
}
