//! Source photo model and DTO.

use aurapix_core::error::CoreError;
use aurapix_core::photo::{parse_warnings, Verdict, WarningKind};
use aurapix_core::status::{PhotoStatus, StatusId};
use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `photos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Photo {
    pub id: DbId,
    pub owner_id: DbId,
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status_id: StatusId,
    pub warnings: Vec<String>,
    pub validated_at: Option<Timestamp>,
    pub retired_at: Option<Timestamp>,
    pub replaced_by_photo_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Photo {
    pub fn status(&self) -> Result<PhotoStatus, CoreError> {
        PhotoStatus::from_id(self.status_id)
    }

    pub fn is_retired(&self) -> bool {
        self.retired_at.is_some()
    }

    pub fn warning_kinds(&self) -> Vec<WarningKind> {
        parse_warnings(&self.warnings)
    }

    /// The stored verdict. Bypassed photos count as valid.
    pub fn verdict(&self) -> Result<Verdict, CoreError> {
        let status = self.status()?;
        Ok(Verdict {
            is_valid: status.is_accepted(),
            warnings: self.warning_kinds(),
        })
    }
}

/// DTO for recording a confirmed upload.
#[derive(Debug, Clone)]
pub struct CreatePhoto {
    pub owner_id: DbId,
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
}
