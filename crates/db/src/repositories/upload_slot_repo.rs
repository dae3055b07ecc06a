//! Repository for the `upload_slots` table.

use aurapix_core::types::DbId;
use sqlx::PgConnection;

use crate::models::upload_slot::{CreateUploadSlot, UploadSlot};

const COLUMNS: &str = "\
    id, owner_id, storage_key, file_name, content_type, size_bytes, \
    replaces_photo_id, expires_at, consumed_at, photo_id, created_at";

/// Provides persistence for issued upload slots.
pub struct UploadSlotRepo;

impl UploadSlotRepo {
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateUploadSlot,
    ) -> Result<UploadSlot, sqlx::Error> {
        let query = format!(
            "INSERT INTO upload_slots \
                (owner_id, storage_key, file_name, content_type, size_bytes, replaces_photo_id, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UploadSlot>(&query)
            .bind(input.owner_id)
            .bind(&input.storage_key)
            .bind(&input.file_name)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .bind(input.replaces_photo_id)
            .bind(input.expires_at)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_storage_key(
        conn: &mut PgConnection,
        storage_key: &str,
    ) -> Result<Option<UploadSlot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM upload_slots WHERE storage_key = $1");
        sqlx::query_as::<_, UploadSlot>(&query)
            .bind(storage_key)
            .fetch_optional(conn)
            .await
    }

    /// Unconsumed, unexpired, non-replacement slots of an owner. These
    /// count against the photo quota.
    pub async fn count_in_flight(conn: &mut PgConnection, owner_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM upload_slots \
             WHERE owner_id = $1 AND consumed_at IS NULL \
               AND expires_at > NOW() AND replaces_photo_id IS NULL",
        )
        .bind(owner_id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Mark a slot consumed by `photo_id`. Returns `false` if it was
    /// already consumed.
    pub async fn consume(
        conn: &mut PgConnection,
        slot_id: DbId,
        photo_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE upload_slots SET consumed_at = NOW(), photo_id = $2 \
             WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(slot_id)
        .bind(photo_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
