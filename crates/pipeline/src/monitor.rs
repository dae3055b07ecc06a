//! Background generation monitor.
//!
//! Drives in-flight sample jobs and batches to a terminal state when no
//! client is polling, auto-curates completed batches that were missed, and
//! releases photos stuck in `validating` after a crash.

use std::time::Duration;

use aurapix_db::repositories::{BatchRepo, PhotoRepo, SampleJobRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::curation::CurationService;
use crate::error::PipelineResult;
use crate::generation::GenerationCoordinator;

/// Default polling interval for the monitor loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What one monitor cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub samples_finished: usize,
    pub batches_finished: usize,
    pub batches_curated: usize,
    pub validations_released: u64,
}

/// A single long-lived Tokio task shared by all owners.
pub struct GenerationMonitor {
    pool: PgPool,
    coordinator: GenerationCoordinator,
    curation: CurationService,
    poll_interval: Duration,
    stale_validation_after: Duration,
}

impl GenerationMonitor {
    pub fn new(
        pool: PgPool,
        coordinator: GenerationCoordinator,
        curation: CurationService,
        poll_interval: Duration,
        stale_validation_after: Duration,
    ) -> Self {
        Self {
            pool,
            coordinator,
            curation,
            poll_interval,
            stale_validation_after,
        }
    }

    /// Run the monitor loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Generation monitor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Generation monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) if report != TickReport::default() => {
                            tracing::debug!(?report, "Monitor cycle finished work");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Monitor cycle failed"),
                    }
                }
            }
        }
    }

    /// One monitor cycle.
    ///
    /// A failure on one job or batch is logged and does not stop the rest
    /// of the cycle.
    pub async fn tick(&self) -> PipelineResult<TickReport> {
        let mut report = TickReport::default();

        for job in SampleJobRepo::list_in_flight(&self.pool).await? {
            match self.coordinator.refresh_sample(&job).await {
                Ok(status) if !status.is_in_flight() => report.samples_finished += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(sample_job_id = job.id, error = %e, "Failed to refresh sample job");
                }
            }
        }

        for batch in BatchRepo::list_in_flight(&self.pool).await? {
            match self.coordinator.refresh_batch(&batch).await {
                Ok(Some(updated)) => {
                    if !updated.status()?.is_in_flight() {
                        report.batches_finished += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(batch_id = batch.id, error = %e, "Failed to refresh batch");
                }
            }
        }

        for batch in BatchRepo::list_uncurated_completed(&self.pool).await? {
            match self.curation.auto_select(batch.id).await {
                Ok(_) => report.batches_curated += 1,
                Err(e) => {
                    tracing::error!(batch_id = batch.id, error = %e, "Failed to auto-select profile set");
                }
            }
        }

        let stale_after = chrono::Duration::from_std(self.stale_validation_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        report.validations_released =
            PhotoRepo::release_stale_validations(&self.pool, chrono::Utc::now() - stale_after).await?;
        if report.validations_released > 0 {
            tracing::warn!(
                released = report.validations_released,
                "Released photos stuck in validation",
            );
        }

        Ok(report)
    }
}
