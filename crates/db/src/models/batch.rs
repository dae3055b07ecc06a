//! Full generation batches.

use aurapix_core::error::CoreError;
use aurapix_core::status::{BatchStatus, StatusId};
use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `batches` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Batch {
    pub id: DbId,
    pub owner_id: DbId,
    pub credit_id: DbId,
    pub scenarios: Vec<String>,
    pub source_photo_ids: Vec<DbId>,
    pub status_id: StatusId,
    pub partial: bool,
    pub external_job_id: Option<String>,
    pub error_message: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub curated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Batch {
    pub fn status(&self) -> Result<BatchStatus, CoreError> {
        BatchStatus::from_id(self.status_id)
    }
}

/// DTO for creating a queued batch.
#[derive(Debug, Clone)]
pub struct CreateBatch {
    pub owner_id: DbId,
    pub credit_id: DbId,
    pub scenarios: Vec<String>,
    pub source_photo_ids: Vec<DbId>,
}
