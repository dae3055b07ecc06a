//! Repository for the `photos` table.
//!
//! Status changes are conditional updates (`WHERE status_id = <expected>`),
//! so two concurrent callers can never both make the same transition.

use aurapix_core::status::{PhotoStatus, StatusId};
use aurapix_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::photo::{CreatePhoto, Photo};

const COLUMNS: &str = "\
    id, owner_id, storage_key, file_name, content_type, size_bytes, \
    status_id, warnings, validated_at, retired_at, replaced_by_photo_id, \
    created_at, updated_at";

/// Provides persistence for source photos.
pub struct PhotoRepo;

impl PhotoRepo {
    /// Insert a pending photo.
    pub async fn create(conn: &mut PgConnection, input: &CreatePhoto) -> Result<Photo, sqlx::Error> {
        let query = format!(
            "INSERT INTO photos (owner_id, storage_key, file_name, content_type, size_bytes, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(input.owner_id)
            .bind(&input.storage_key)
            .bind(&input.file_name)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .bind(PhotoStatus::Pending.id())
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photos WHERE id = $1");
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look up a photo by id inside a transaction, locking the row.
    pub async fn find_for_update(conn: &mut PgConnection, id: DbId) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photos WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_by_storage_key(
        conn: &mut PgConnection,
        storage_key: &str,
    ) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photos WHERE storage_key = $1");
        sqlx::query_as::<_, Photo>(&query)
            .bind(storage_key)
            .fetch_optional(conn)
            .await
    }

    /// Active (non-retired) photos of an owner, oldest first.
    pub async fn list_active(pool: &PgPool, owner_id: DbId) -> Result<Vec<Photo>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photos \
             WHERE owner_id = $1 AND retired_at IS NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// `(id, status_id)` for every active photo of an owner.
    pub async fn active_statuses(
        conn: &mut PgConnection,
        owner_id: DbId,
    ) -> Result<Vec<(DbId, StatusId)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, status_id FROM photos \
             WHERE owner_id = $1 AND retired_at IS NULL \
             ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(conn)
        .await
    }

    pub async fn count_active(conn: &mut PgConnection, owner_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM photos WHERE owner_id = $1 AND retired_at IS NULL",
        )
        .bind(owner_id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Move an active photo from `pending` to `validating`.
    ///
    /// Returns `None` when the photo is not pending or is retired; only
    /// one concurrent caller can win the claim.
    pub async fn claim_for_validation(pool: &PgPool, id: DbId) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET status_id = $2 \
             WHERE id = $1 AND status_id = $3 AND retired_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(PhotoStatus::Validating.id())
            .bind(PhotoStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Record a verdict on a photo that is `validating`.
    pub async fn record_verdict(
        pool: &PgPool,
        id: DbId,
        status: PhotoStatus,
        warnings: &[String],
    ) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET status_id = $2, warnings = $3, validated_at = NOW() \
             WHERE id = $1 AND status_id = $4 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(status.id())
            .bind(warnings)
            .bind(PhotoStatus::Validating.id())
            .fetch_optional(pool)
            .await
    }

    /// Move an active photo from `failed` to `bypassed`.
    pub async fn bypass(pool: &PgPool, id: DbId) -> Result<Option<Photo>, sqlx::Error> {
        let query = format!(
            "UPDATE photos SET status_id = $2 \
             WHERE id = $1 AND status_id = $3 AND retired_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(PhotoStatus::Bypassed.id())
            .bind(PhotoStatus::Failed.id())
            .fetch_optional(pool)
            .await
    }

    /// Retire an active photo in favour of `replaced_by`. Returns `false`
    /// if the photo was already retired.
    pub async fn retire(
        conn: &mut PgConnection,
        id: DbId,
        replaced_by: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE photos SET retired_at = NOW(), replaced_by_photo_id = $2 \
             WHERE id = $1 AND retired_at IS NULL",
        )
        .bind(id)
        .bind(replaced_by)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Return photos stuck in `validating` since before `cutoff` to
    /// `pending` so they can be validated again.
    pub async fn release_stale_validations(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE photos SET status_id = $1 \
             WHERE status_id = $2 AND updated_at < $3",
        )
        .bind(PhotoStatus::Pending.id())
        .bind(PhotoStatus::Validating.id())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
