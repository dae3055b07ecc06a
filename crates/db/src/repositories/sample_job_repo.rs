//! Repository for the `sample_jobs` and `sample_images` tables.

use aurapix_core::generation::GeneratedOutput;
use aurapix_core::status::{SampleJobStatus, StatusId};
use aurapix_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::sample::{CreateSampleJob, SampleImage, SampleJob};

const COLUMNS: &str = "\
    id, owner_id, fingerprint, scenarios, source_photo_ids, status_id, \
    external_job_id, error_message, submitted_at, completed_at, created_at, updated_at";

const IMAGE_COLUMNS: &str = "id, sample_job_id, scenario, storage_key, created_at";

/// Queued, running, and completed jobs are "current"; at most one per owner.
const CURRENT_STATUSES: [StatusId; 3] = [
    SampleJobStatus::Queued as StatusId,
    SampleJobStatus::Running as StatusId,
    SampleJobStatus::Completed as StatusId,
];

const IN_FLIGHT_STATUSES: [StatusId; 2] = [
    SampleJobStatus::Queued as StatusId,
    SampleJobStatus::Running as StatusId,
];

/// Provides persistence for sample jobs.
pub struct SampleJobRepo;

impl SampleJobRepo {
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateSampleJob,
    ) -> Result<SampleJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO sample_jobs (owner_id, fingerprint, scenarios, source_photo_ids, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SampleJob>(&query)
            .bind(input.owner_id)
            .bind(&input.fingerprint)
            .bind(&input.scenarios)
            .bind(&input.source_photo_ids)
            .bind(SampleJobStatus::Queued.id())
            .fetch_one(conn)
            .await
    }

    /// The owner's current (queued, running or completed) job.
    pub async fn find_current(
        conn: &mut PgConnection,
        owner_id: DbId,
    ) -> Result<Option<SampleJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sample_jobs WHERE owner_id = $1 AND status_id = ANY($2)"
        );
        sqlx::query_as::<_, SampleJob>(&query)
            .bind(owner_id)
            .bind(&CURRENT_STATUSES[..])
            .fetch_optional(conn)
            .await
    }

    /// The owner's most recent job that has not been superseded.
    pub async fn find_latest(pool: &PgPool, owner_id: DbId) -> Result<Option<SampleJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sample_jobs \
             WHERE owner_id = $1 AND status_id <> $2 \
             ORDER BY id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, SampleJob>(&query)
            .bind(owner_id)
            .bind(SampleJobStatus::Superseded.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark the owner's current job superseded.
    pub async fn supersede_current(conn: &mut PgConnection, owner_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sample_jobs SET status_id = $2 \
             WHERE owner_id = $1 AND status_id = ANY($3)",
        )
        .bind(owner_id)
        .bind(SampleJobStatus::Superseded.id())
        .bind(&CURRENT_STATUSES[..])
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_in_flight(pool: &PgPool) -> Result<Vec<SampleJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sample_jobs WHERE status_id = ANY($1) ORDER BY id"
        );
        sqlx::query_as::<_, SampleJob>(&query)
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
            "UPDATE sample_jobs SET status_id = $2, external_job_id = $3, submitted_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(SampleJobStatus::Running.id())
        .bind(external_job_id)
        .bind(SampleJobStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move an in-flight job to `completed` or `failed`. A superseded job
    /// is left alone.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        status: SampleJobStatus,
        error_message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sample_jobs SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = ANY($4)",
        )
        .bind(id)
        .bind(status.id())
        .bind(error_message)
        .bind(&IN_FLIGHT_STATUSES[..])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_images(
        pool: &PgPool,
        sample_job_id: DbId,
        outputs: &[GeneratedOutput],
    ) -> Result<u64, sqlx::Error> {
        if outputs.is_empty() {
            return Ok(0);
        }
        let scenarios: Vec<&str> = outputs.iter().map(|o| o.scenario.as_str()).collect();
        let keys: Vec<&str> = outputs.iter().map(|o| o.storage_key.as_str()).collect();
        let result = sqlx::query(
            "INSERT INTO sample_images (sample_job_id, scenario, storage_key) \
             SELECT $1, s.scenario, s.storage_key \
             FROM UNNEST($2::TEXT[], $3::TEXT[]) AS s(scenario, storage_key) \
             ON CONFLICT (sample_job_id, storage_key) DO NOTHING",
        )
        .bind(sample_job_id)
        .bind(&scenarios)
        .bind(&keys)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_images(pool: &PgPool, sample_job_id: DbId) -> Result<Vec<SampleImage>, sqlx::Error> {
        let query = format!(
            "SELECT {IMAGE_COLUMNS} FROM sample_images WHERE sample_job_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, SampleImage>(&query)
            .bind(sample_job_id)
            .fetch_all(pool)
            .await
    }
}
