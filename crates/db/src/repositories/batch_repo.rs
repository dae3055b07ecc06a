//! Repository for the `batches` table.

use aurapix_core::status::{BatchStatus, StatusId};
use aurapix_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::batch::{Batch, CreateBatch};

const COLUMNS: &str = "\
    id, owner_id, credit_id, scenarios, source_photo_ids, status_id, partial, \
    external_job_id, error_message, submitted_at, completed_at, curated_at, \
    created_at, updated_at";

/// Queued and running.
const IN_FLIGHT_STATUSES: [StatusId; 2] = [BatchStatus::Queued as StatusId, BatchStatus::Running as StatusId];

/// Provides persistence for full generation batches.
pub struct BatchRepo;

impl BatchRepo {
    pub async fn create(conn: &mut PgConnection, input: &CreateBatch) -> Result<Batch, sqlx::Error> {
        let query = format!(
            "INSERT INTO batches (owner_id, credit_id, scenarios, source_photo_ids, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(input.owner_id)
            .bind(input.credit_id)
            .bind(&input.scenarios)
            .bind(&input.source_photo_ids)
            .bind(BatchStatus::Queued.id())
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Batch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batches WHERE id = $1");
        sqlx::query_as::<_, Batch>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Newest first.
    pub async fn list_for_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Batch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM batches WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// The owner's queued or running batch, if any.
    pub async fn find_in_flight(
        conn: &mut PgConnection,
        owner_id: DbId,
    ) -> Result<Option<Batch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM batches WHERE owner_id = $1 AND status_id = ANY($2)"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(owner_id)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_optional(conn)
            .await
    }

    /// Every queued or running batch, oldest first.
    pub async fn list_in_flight(pool: &PgPool) -> Result<Vec<Batch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM batches WHERE status_id = ANY($1) ORDER BY id"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_all(pool)
            .await
    }

    /// Record the external job id and move `queued -> running`.
    pub async fn mark_submitted(
        pool: &PgPool,
        id: DbId,
        external_job_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batches SET status_id = $2, external_job_id = $3, submitted_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(BatchStatus::Running.id())
        .bind(external_job_id)
        .bind(BatchStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move an in-flight batch to a terminal status.
    ///
    /// Returns `None` if the batch had already finished, so the caller
    /// that wins applies the side effects exactly once.
    pub async fn finish(
        conn: &mut PgConnection,
        id: DbId,
        status: BatchStatus,
        partial: bool,
        error_message: Option<&str>,
    ) -> Result<Option<Batch>, sqlx::Error> {
        let query = format!(
            "UPDATE batches \
             SET status_id = $2, partial = $3, error_message = $4, completed_at = NOW() \
             WHERE id = $1 AND status_id = ANY($5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(id)
            .bind(status.id())
            .bind(partial)
            .bind(error_message)
            .bind(&IN_FLIGHT_STATUSES[..])
            .fetch_optional(conn)
            .await
    }

    /// Completed batches that have not been through auto-curation yet.
    pub async fn list_uncurated_completed(pool: &PgPool) -> Result<Vec<Batch>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM batches \
             WHERE status_id = $1 AND curated_at IS NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, Batch>(&query)
            .bind(BatchStatus::Completed.id())
            .fetch_all(pool)
            .await
    }

    /// Stamp `curated_at`. Returns `false` if it was already set.
    pub async fn mark_curated(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batches SET curated_at = NOW() WHERE id = $1 AND curated_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
