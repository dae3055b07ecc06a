//! Issued upload slots.

use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `upload_slots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UploadSlot {
    pub id: DbId,
    pub owner_id: DbId,
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub replaces_photo_id: Option<DbId>,
    pub expires_at: Timestamp,
    pub consumed_at: Option<Timestamp>,
    pub photo_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// DTO for issuing a slot.
#[derive(Debug, Clone)]
pub struct CreateUploadSlot {
    pub owner_id: DbId,
    pub storage_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub replaces_photo_id: Option<DbId>,
    pub expires_at: Timestamp,
}
