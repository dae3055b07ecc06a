//! Sample and full generation: trigger, poll, and finalise.
//!
//! Jobs run on the external generation service and are observed by
//! polling, either from a client request or from [`crate::monitor`]. Both
//! paths funnel through the same conditional `finish` updates, so a job's
//! side effects (recorded images, credit restoration, curation) apply once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aurapix_core::error::CoreError;
use aurapix_core::generation::{
    classify_batch, classify_sample, is_timed_out, requested_outputs, BatchOutcome,
    GeneratedOutput, GenerationKind, GenerationRequest, GenerationService, GenerationServiceError,
    JobSnapshot, SourceImageRef,
};
use aurapix_core::photo::{accepted_set_fingerprint, can_proceed};
use aurapix_core::scenario::{preview_scenarios, validate_full_scenarios};
use aurapix_core::status::{BatchStatus, PhotoStatus, SampleJobStatus};
use aurapix_core::types::{DbId, Timestamp};
use aurapix_db::models::batch::{Batch, CreateBatch};
use aurapix_db::models::sample::{CreateSampleJob, SampleJob};
use aurapix_db::repositories::{BatchRepo, CreditRepo, GeneratedImageRepo, PhotoRepo, SampleJobRepo};
use sqlx::PgPool;

use crate::credits::CreditGate;
use crate::curation::{lock_owner, CurationService};
use crate::error::{PipelineError, PipelineResult};
use crate::photos::active_statuses;
use crate::presign::Presigner;
use crate::views::{BatchView, GenerationStatus, ImageView, SamplePoll, SampleStart};

/// A queued job that never reached the service is resubmitted after this.
const RESUBMIT_AFTER: Duration = Duration::from_secs(60);

/// Where an in-flight job stands after one look at the service.
enum Progress {
    /// Still running; nothing to record.
    Pending,
    /// Finished (or given up on) with these outputs.
    Finished {
        outputs: Vec<GeneratedOutput>,
        error: Option<String>,
    },
}

#[derive(Clone)]
pub struct GenerationCoordinator {
    pool: PgPool,
    generator: Arc<dyn GenerationService>,
    presigner: Presigner,
    credits: CreditGate,
    curation: CurationService,
    job_timeout: Duration,
}

impl GenerationCoordinator {
    pub fn new(
        pool: PgPool,
        generator: Arc<dyn GenerationService>,
        presigner: Presigner,
        credits: CreditGate,
        curation: CurationService,
        job_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            generator,
            presigner,
            credits,
            curation,
            job_timeout,
        }
    }

    // -- samples --

    /// Start a sample job for the owner's accepted photo set.
    ///
    /// Idempotent per photo set: when a queued, running, or completed job
    /// already exists for the same fingerprint it is returned with
    /// `started = false`.
    pub async fn start_sample(&self, owner_id: DbId) -> PipelineResult<SampleStart> {
        self.try_start_sample(owner_id)
            .await?
            .ok_or_else(|| not_ready().into())
    }

    /// Like [`Self::start_sample`], but `None` when the photos are not ready.
    pub async fn try_start_sample(&self, owner_id: DbId) -> PipelineResult<Option<SampleStart>> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        let photos = active_statuses(&mut *tx, owner_id).await?;
        if !can_proceed(&photos) {
            return Ok(None);
        }
        let fingerprint = accepted_set_fingerprint(&photos);

        if let Some(current) = SampleJobRepo::find_current(&mut *tx, owner_id).await? {
            if current.fingerprint == fingerprint {
                tx.commit().await?;
                return Ok(Some(SampleStart {
                    sample_job_id: current.id,
                    status: current.status()?,
                    started: false,
                }));
            }
            SampleJobRepo::supersede_current(&mut *tx, owner_id).await?;
            tracing::info!(
                owner_id,
                sample_job_id = current.id,
                "Photo set changed, previous sample superseded",
            );
        }

        let job = SampleJobRepo::create(
            &mut *tx,
            &CreateSampleJob {
                owner_id,
                fingerprint,
                scenarios: preview_scenarios(),
                source_photo_ids: accepted_ids(&photos),
            },
        )
        .await?;
        tx.commit().await?;
        tracing::info!(owner_id, sample_job_id = job.id, "Sample job created");

        let status = self.submit_sample(&job).await?;
        Ok(Some(SampleStart {
            sample_job_id: job.id,
            status,
            started: true,
        }))
    }

    /// Latest sample job of the owner. Images are listed only once it has
    /// completed.
    pub async fn poll_sample(&self, owner_id: DbId) -> PipelineResult<SamplePoll> {
        let Some(job) = SampleJobRepo::find_latest(&self.pool, owner_id).await? else {
            return Ok(SamplePoll::none());
        };

        let mut status = job.status()?;
        if status.is_in_flight() {
            status = match self.refresh_sample(&job).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(sample_job_id = job.id, error = %e, "Sample refresh failed");
                    status
                }
            };
        }

        let images = if status == SampleJobStatus::Completed {
            let rows = SampleJobRepo::list_images(&self.pool, job.id).await?;
            self.presigner.samples(&rows).await?
        } else {
            Vec::new()
        };

        Ok(SamplePoll {
            sample_job_id: Some(job.id),
            status: Some(status),
            done: !status.is_in_flight(),
            images,
        })
    }

    /// Check an in-flight sample job with the service and record the
    /// result if it has finished. Returns the job's resulting status.
    pub async fn refresh_sample(&self, job: &SampleJob) -> PipelineResult<SampleJobStatus> {
        let Some(ref external_job_id) = job.external_job_id else {
            if is_timed_out(job.created_at, chrono::Utc::now(), RESUBMIT_AFTER) {
                return self.submit_sample(job).await;
            }
            return Ok(job.status()?);
        };

        let started_at = job.submitted_at.unwrap_or(job.created_at);
        match self.check_job(external_job_id, started_at).await? {
            Progress::Pending => Ok(job.status()?),
            Progress::Finished { outputs, error } => {
                self.finish_sample(job, &outputs, error.as_deref()).await
            }
        }
    }

    async fn submit_sample(&self, job: &SampleJob) -> PipelineResult<SampleJobStatus> {
        let request = match self
            .build_request(GenerationKind::Sample, job.id, job.owner_id, &job.scenarios, &job.source_photo_ids)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(sample_job_id = job.id, error = %e, "Could not prepare sample job, will retry");
                return Ok(SampleJobStatus::Queued);
            }
        };

        match self.generator.submit(&request).await {
            Ok(external_job_id) => {
                SampleJobRepo::mark_submitted(&self.pool, job.id, &external_job_id).await?;
                tracing::info!(sample_job_id = job.id, external_job_id = %external_job_id, "Sample job submitted");
                Ok(SampleJobStatus::Running)
            }
            Err(e) => {
                tracing::warn!(sample_job_id = job.id, error = %e, "Sample submission failed");
                SampleJobRepo::finish(&self.pool, job.id, SampleJobStatus::Failed, Some(&e.to_string()))
                    .await?;
                Ok(SampleJobStatus::Failed)
            }
        }
    }

    async fn finish_sample(
        &self,
        job: &SampleJob,
        outputs: &[GeneratedOutput],
        error: Option<&str>,
    ) -> PipelineResult<SampleJobStatus> {
        let outputs = requested_outputs(&job.scenarios, outputs);
        let status = classify_sample(&outputs);
        SampleJobRepo::insert_images(&self.pool, job.id, &outputs).await?;

        let note = (status == SampleJobStatus::Failed)
            .then(|| error.unwrap_or("Sample generation produced no images"));
        if SampleJobRepo::finish(&self.pool, job.id, status, note).await? {
            tracing::info!(
                sample_job_id = job.id,
                owner_id = job.owner_id,
                status = %status,
                images = outputs.len(),
                "Sample job finished",
            );
        }
        Ok(status)
    }

    // -- full batches --

    /// Redeem a credit and start a full batch.
    ///
    /// Redemption and batch creation share one transaction under the
    /// owner's row lock; a failure before commit leaves the credit
    /// unredeemed. Without `credit_id` the owner's oldest unredeemed credit
    /// is used.
    pub async fn start_full(
        &self,
        owner_id: DbId,
        scenarios: Vec<String>,
        credit_id: Option<DbId>,
    ) -> PipelineResult<BatchView> {
        validate_full_scenarios(&scenarios)?;

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        let photos = active_statuses(&mut *tx, owner_id).await?;
        if !can_proceed(&photos) {
            return Err(not_ready().into());
        }
        if let Some(running) = BatchRepo::find_in_flight(&mut *tx, owner_id).await? {
            return Err(CoreError::Conflict(format!(
                "Generation {} is already in progress",
                running.id
            ))
            .into());
        }

        let credit_id = match credit_id {
            Some(id) => id,
            None => CreditRepo::oldest_unredeemed(&self.pool, owner_id)
                .await?
                .map(|c| c.id)
                .ok_or(CoreError::CreditNotAvailable)?,
        };
        let credit = self.credits.redeem(&mut *tx, credit_id, owner_id).await?;

        let batch = BatchRepo::create(
            &mut *tx,
            &CreateBatch {
                owner_id,
                credit_id: credit.id,
                scenarios,
                source_photo_ids: accepted_ids(&photos),
            },
        )
        .await?;
        CreditRepo::attach_batch(&mut *tx, credit.id, batch.id).await?;
        tx.commit().await?;
        tracing::info!(owner_id, batch_id = batch.id, credit_id = credit.id, "Batch created");

        self.submit_batch(&batch).await?;
        let batch = self.load_batch(batch.id).await?;
        Ok(BatchView::new(&batch, Vec::new())?)
    }

    /// One owned batch with its images. An in-flight batch is refreshed
    /// against the service first.
    pub async fn poll_full(&self, owner_id: DbId, batch_id: DbId) -> PipelineResult<BatchView> {
        let mut batch = self.load_batch(batch_id).await?;
        if batch.owner_id != owner_id {
            return Err(batch_not_found(batch_id).into());
        }

        if batch.status()?.is_in_flight() {
            match self.refresh_batch(&batch).await {
                Ok(Some(finished)) => batch = finished,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(batch_id, error = %e, "Batch refresh failed");
                }
            }
        }

        let rows = GeneratedImageRepo::list_for_batches(&self.pool, &[batch.id]).await?;
        let images = self.presigner.generated(&rows).await?;
        Ok(BatchView::new(&batch, images)?)
    }

    /// The owner's batches, newest first, with their images.
    pub async fn list_batches(&self, owner_id: DbId) -> PipelineResult<Vec<BatchView>> {
        let batches = BatchRepo::list_for_owner(&self.pool, owner_id).await?;
        let ids: Vec<DbId> = batches.iter().map(|b| b.id).collect();
        let rows = GeneratedImageRepo::list_for_batches(&self.pool, &ids).await?;
        let images = self.presigner.generated(&rows).await?;

        let mut by_batch: HashMap<DbId, Vec<ImageView>> = HashMap::new();
        for (row, view) in rows.iter().zip(images) {
            by_batch.entry(row.batch_id).or_default().push(view);
        }
        Ok(batches
            .iter()
            .map(|b| BatchView::new(b, by_batch.remove(&b.id).unwrap_or_default()))
            .collect::<Result<_, _>>()?)
    }

    /// Whether a batch is queued or running for the owner.
    pub async fn generation_status(&self, owner_id: DbId) -> PipelineResult<GenerationStatus> {
        let mut conn = self.pool.acquire().await?;
        let running = BatchRepo::find_in_flight(&mut *conn, owner_id).await?;
        Ok(GenerationStatus {
            is_generating: running.is_some(),
            batch_id: running.map(|b| b.id),
        })
    }

    /// Check an in-flight batch with the service. Returns the batch if this
    /// call finished it.
    pub async fn refresh_batch(&self, batch: &Batch) -> PipelineResult<Option<Batch>> {
        let Some(ref external_job_id) = batch.external_job_id else {
            if is_timed_out(batch.created_at, chrono::Utc::now(), RESUBMIT_AFTER) {
                return self.submit_batch(batch).await;
            }
            return Ok(None);
        };

        let started_at = batch.submitted_at.unwrap_or(batch.created_at);
        match self.check_job(external_job_id, started_at).await? {
            Progress::Pending => Ok(None),
            Progress::Finished { outputs, error } => {
                self.finalize_batch(batch, &outputs, error.as_deref()).await
            }
        }
    }

    /// Submit a queued batch. A rejected submission finishes the batch
    /// with zero images, which restores its credit.
    async fn submit_batch(&self, batch: &Batch) -> PipelineResult<Option<Batch>> {
        let request = match self
            .build_request(
                GenerationKind::Full,
                batch.id,
                batch.owner_id,
                &batch.scenarios,
                &batch.source_photo_ids,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(batch_id = batch.id, error = %e, "Could not prepare batch, will retry");
                return Ok(None);
            }
        };

        match self.generator.submit(&request).await {
            Ok(external_job_id) => {
                BatchRepo::mark_submitted(&self.pool, batch.id, &external_job_id).await?;
                tracing::info!(batch_id = batch.id, external_job_id = %external_job_id, "Batch submitted");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(batch_id = batch.id, error = %e, "Batch submission failed");
                self.finalize_batch(batch, &[], Some(&e.to_string())).await
            }
        }
    }

    /// Record outputs and move the batch to its terminal status.
    ///
    /// Only the caller whose `finish` update wins applies the side effects:
    /// zero images restores the credit, a completed batch is curated.
    async fn finalize_batch(
        &self,
        batch: &Batch,
        outputs: &[GeneratedOutput],
        error: Option<&str>,
    ) -> PipelineResult<Option<Batch>> {
        let outputs = requested_outputs(&batch.scenarios, outputs);
        let outcome = classify_batch(&batch.scenarios, &outputs);
        GeneratedImageRepo::insert_outputs(&self.pool, batch.id, batch.owner_id, &outputs).await?;

        let note = match (outcome.note(batch.id), error) {
            (Some(note), Some(error)) if outcome.restores_credit() => Some(format!("{note}: {error}")),
            (note, _) => note,
        };
        // The terminal status and the credit restore commit together; if
        // either fails the batch stays in flight and is finalised again.
        let mut tx = self.pool.begin().await?;
        let Some(finished) = BatchRepo::finish(
            &mut *tx,
            batch.id,
            outcome.status(),
            outcome.is_partial(),
            note.as_deref(),
        )
        .await?
        else {
            return Ok(None);
        };
        if outcome.restores_credit() {
            self.credits
                .restore_for_failed_batch(&mut *tx, batch.credit_id, batch.id)
                .await?;
        }
        tx.commit().await?;

        match outcome {
            BatchOutcome::Failed => {}
            BatchOutcome::CompletedPartial { produced, requested } => {
                tracing::warn!(
                    batch_id = batch.id,
                    owner_id = batch.owner_id,
                    produced,
                    requested,
                    "Batch completed with partial results",
                );
            }
            BatchOutcome::Completed => {
                tracing::info!(
                    batch_id = batch.id,
                    owner_id = batch.owner_id,
                    images = outputs.len(),
                    "Batch completed",
                );
            }
        }

        if finished.status()? == BatchStatus::Completed {
            if let Err(e) = self.curation.auto_select(finished.id).await {
                tracing::error!(batch_id = finished.id, error = %e, "Auto-selection failed");
            }
        }
        Ok(Some(finished))
    }

    // -- shared --

    /// Ask the service about a job. Jobs past the timeout, and jobs the
    /// service no longer knows, are finished with what they have.
    async fn check_job(&self, external_job_id: &str, started_at: Timestamp) -> PipelineResult<Progress> {
        let timed_out = is_timed_out(started_at, chrono::Utc::now(), self.job_timeout);
        let snapshot: JobSnapshot = match self.generator.fetch(external_job_id).await {
            Ok(s) => s,
            Err(GenerationServiceError::UnknownJob(id)) => {
                return Ok(Progress::Finished {
                    outputs: Vec::new(),
                    error: Some(format!("Generation job '{id}' is unknown to the service")),
                });
            }
            Err(e) if timed_out => {
                return Ok(Progress::Finished {
                    outputs: Vec::new(),
                    error: Some(format!("Job timed out: {e}")),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if snapshot.state.is_terminal() {
            Ok(Progress::Finished {
                outputs: snapshot.outputs,
                error: snapshot.error,
            })
        } else if timed_out {
            tracing::warn!(external_job_id, "Generation job timed out, finalising with current outputs");
            Ok(Progress::Finished {
                outputs: snapshot.outputs,
                error: Some("Job timed out".to_string()),
            })
        } else {
            Ok(Progress::Pending)
        }
    }

    async fn build_request(
        &self,
        kind: GenerationKind,
        reference_id: DbId,
        owner_id: DbId,
        scenarios: &[String],
        photo_ids: &[DbId],
    ) -> PipelineResult<GenerationRequest> {
        let mut source_images = Vec::with_capacity(photo_ids.len());
        for &photo_id in photo_ids {
            let Some(photo) = PhotoRepo::find_by_id(&self.pool, photo_id).await? else {
                tracing::warn!(photo_id, reference_id, "Source photo missing, skipping");
                continue;
            };
            let url = self.presigner.download(&photo.storage_key).await?;
            source_images.push(SourceImageRef {
                photo_id,
                url: url.url,
            });
        }
        if source_images.is_empty() {
            return Err(PipelineError::Core(CoreError::Internal(format!(
                "No source photos available for {kind:?} job {reference_id}"
            ))));
        }

        Ok(GenerationRequest {
            kind,
            reference_id,
            owner_id,
            scenarios: scenarios.to_vec(),
            source_images,
        })
    }

    async fn load_batch(&self, batch_id: DbId) -> PipelineResult<Batch> {
        BatchRepo::find_by_id(&self.pool, batch_id)
            .await?
            .ok_or_else(|| batch_not_found(batch_id).into())
    }
}

fn accepted_ids(photos: &[(DbId, PhotoStatus)]) -> Vec<DbId> {
    photos
        .iter()
        .filter(|(_, s)| s.is_accepted())
        .map(|(id, _)| *id)
        .collect()
}

fn not_ready() -> CoreError {
    CoreError::Validation(
        "Photos are not ready: resolve every pending or failed photo (bypass or replace) \
         and keep at least one accepted photo"
            .into(),
    )
}

fn batch_not_found(batch_id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Batch",
        id: batch_id,
    }
}
