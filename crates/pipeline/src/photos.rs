//! Photo lifecycle: upload slots, confirmation, validation, bypass, and
//! replacement.
//!
//! Quota-affecting mutations (issuing a slot, recording a photo, replacing
//! one) run under the owner's account row lock so the active count cannot
//! be raced past the limit. Validation relies on the conditional
//! `pending -> validating` claim instead, so it never holds a transaction
//! open across the vision call.

use std::time::Duration;

use aurapix_core::error::CoreError;
use aurapix_core::photo::{
    bypass_action, check_upload_quota, ensure_replaceable, validation_gate, warnings_to_strings,
    BypassAction, PhotoProgress, ValidationGate, Verdict, MAX_ACTIVE_PHOTOS,
};
use aurapix_core::status::PhotoStatus;
use aurapix_core::storage::{is_owner_photo_key, photo_storage_key, validate_upload, MAX_UPLOAD_BYTES};
use aurapix_core::types::DbId;
use aurapix_core::vision::ImageRef;
use aurapix_db::models::photo::{CreatePhoto, Photo};
use aurapix_db::models::upload_slot::CreateUploadSlot;
use aurapix_db::repositories::{PhotoRepo, UploadSlotRepo};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::curation::lock_owner;
use crate::error::PipelineResult;
use crate::generation::GenerationCoordinator;
use crate::presign::Presigner;
use crate::validation::ValidationEngine;
use crate::views::{BypassResult, PhotoView, UploadSlotView, ValidationResult};

const ENTITY: &str = "Photo";
const MAX_FILE_NAME_LEN: usize = 255;

/// Request for an upload location.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Issue the slot as a one-for-one replacement of this active photo.
    #[serde(default)]
    pub replaces_photo_id: Option<DbId>,
}

#[derive(Clone)]
pub struct PhotoLifecycle {
    pool: PgPool,
    presigner: Presigner,
    validator: ValidationEngine,
    generation: GenerationCoordinator,
    upload_expiry: Duration,
}

impl PhotoLifecycle {
    pub fn new(
        pool: PgPool,
        presigner: Presigner,
        validator: ValidationEngine,
        generation: GenerationCoordinator,
        upload_expiry: Duration,
    ) -> Self {
        Self {
            pool,
            presigner,
            validator,
            generation,
            upload_expiry,
        }
    }

    // -- uploads --

    /// Issue a presigned upload location.
    ///
    /// New slots count against the quota until they are confirmed or
    /// expire; replacement slots do not.
    pub async fn request_upload_slot(
        &self,
        owner_id: DbId,
        request: &UploadRequest,
    ) -> PipelineResult<UploadSlotView> {
        let ext = validate_upload(&request.content_type, request.size_bytes)?;
        let file_name = request.file_name.trim();
        if file_name.is_empty() || file_name.len() > MAX_FILE_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "fileName must be 1 to {MAX_FILE_NAME_LEN} characters"
            ))
            .into());
        }

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        match request.replaces_photo_id {
            Some(photo_id) => {
                let photo = owned(PhotoRepo::find_for_update(&mut *tx, photo_id).await?, owner_id, photo_id)?;
                ensure_replaceable(photo.id, photo.is_retired())?;
            }
            None => {
                let active = PhotoRepo::count_active(&mut *tx, owner_id).await?;
                let in_flight = UploadSlotRepo::count_in_flight(&mut *tx, owner_id).await?;
                check_upload_quota(active, in_flight, false)?;
            }
        }

        let storage_key = photo_storage_key(owner_id, ext);
        let presigned = self
            .presigner
            .storage()
            .presign_upload(&storage_key, &request.content_type, self.upload_expiry)
            .await?;
        let slot = UploadSlotRepo::create(
            &mut *tx,
            &CreateUploadSlot {
                owner_id,
                storage_key,
                file_name: file_name.to_string(),
                content_type: request.content_type.to_ascii_lowercase(),
                size_bytes: request.size_bytes,
                replaces_photo_id: request.replaces_photo_id,
                expires_at: presigned.expires_at,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            owner_id,
            slot_id = slot.id,
            storage_key = %slot.storage_key,
            replaces_photo_id = ?slot.replaces_photo_id,
            "Upload slot issued",
        );
        Ok(UploadSlotView {
            slot_id: slot.id,
            storage_key: slot.storage_key,
            upload_url: presigned.url,
            expires_at: presigned.expires_at,
            replaces_photo_id: slot.replaces_photo_id,
        })
    }

    /// Record an uploaded object as a pending photo.
    ///
    /// Idempotent on `storage_key`. A replacement slot retires the photo it
    /// replaces in the same transaction.
    pub async fn confirm_upload(&self, owner_id: DbId, storage_key: &str) -> PipelineResult<PhotoView> {
        let (photo, _) = self.record_upload(owner_id, storage_key, None).await?;
        Ok(PhotoView::try_from(&photo)?)
    }

    /// Replace `old_photo_id` with the upload at `storage_key` and validate
    /// the new photo in the background. Returns the new photo immediately.
    pub async fn replace(
        &self,
        owner_id: DbId,
        old_photo_id: DbId,
        storage_key: &str,
    ) -> PipelineResult<PhotoView> {
        let (photo, created) = self
            .record_upload(owner_id, storage_key, Some(old_photo_id))
            .await?;
        if created || photo.status()? == PhotoStatus::Pending {
            self.spawn_validation(owner_id, photo.id);
        }
        Ok(PhotoView::try_from(&photo)?)
    }

    /// Returns the photo and whether this call created it.
    async fn record_upload(
        &self,
        owner_id: DbId,
        storage_key: &str,
        replacing: Option<DbId>,
    ) -> PipelineResult<(Photo, bool)> {
        if !is_owner_photo_key(owner_id, storage_key) {
            return Err(CoreError::UnknownStorageKey(storage_key.to_string()).into());
        }
        {
            let mut conn = self.pool.acquire().await?;
            if let Some(existing) = PhotoRepo::find_by_storage_key(&mut *conn, storage_key).await? {
                return Ok((self.confirmed(existing, owner_id, storage_key, replacing).await?, false));
            }
        }

        let meta = self
            .presigner
            .storage()
            .head(storage_key)
            .await?
            .ok_or_else(|| {
                CoreError::Validation(format!("Nothing has been uploaded to '{storage_key}' yet"))
            })?;
        if meta.size_bytes > MAX_UPLOAD_BYTES {
            return Err(CoreError::Validation(format!(
                "Uploaded object is {} bytes, limit is {MAX_UPLOAD_BYTES}",
                meta.size_bytes
            ))
            .into());
        }

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        if let Some(existing) = PhotoRepo::find_by_storage_key(&mut *tx, storage_key).await? {
            drop(tx);
            return Ok((self.confirmed(existing, owner_id, storage_key, replacing).await?, false));
        }
        let slot = UploadSlotRepo::find_by_storage_key(&mut *tx, storage_key)
            .await?
            .filter(|s| s.owner_id == owner_id)
            .ok_or_else(|| CoreError::UnknownStorageKey(storage_key.to_string()))?;
        if let Some(old_photo_id) = replacing {
            if slot.replaces_photo_id != Some(old_photo_id) {
                return Err(CoreError::Validation(format!(
                    "Upload slot for '{storage_key}' was not issued to replace photo {old_photo_id}"
                ))
                .into());
            }
        }

        let photo = PhotoRepo::create(
            &mut *tx,
            &CreatePhoto {
                owner_id,
                storage_key: slot.storage_key.clone(),
                file_name: slot.file_name.clone(),
                content_type: slot.content_type.clone(),
                size_bytes: meta.size_bytes,
            },
        )
        .await?;

        match slot.replaces_photo_id {
            Some(old_photo_id) => {
                let old = owned(
                    PhotoRepo::find_for_update(&mut *tx, old_photo_id).await?,
                    owner_id,
                    old_photo_id,
                )?;
                ensure_replaceable(old.id, old.is_retired())?;
                PhotoRepo::retire(&mut *tx, old.id, photo.id).await?;
                tracing::info!(owner_id, old_photo_id, new_photo_id = photo.id, "Photo replaced");
            }
            None => {
                let active = PhotoRepo::count_active(&mut *tx, owner_id).await?;
                if active > MAX_ACTIVE_PHOTOS {
                    return Err(CoreError::QuotaExceeded {
                        active: active - 1,
                        in_flight: 0,
                        limit: MAX_ACTIVE_PHOTOS,
                    }
                    .into());
                }
            }
        }
        UploadSlotRepo::consume(&mut *tx, slot.id, photo.id).await?;
        tx.commit().await?;

        tracing::info!(owner_id, photo_id = photo.id, storage_key, "Upload confirmed");
        Ok((photo, true))
    }

    // -- state machine --

    /// Validate a photo.
    ///
    /// Only one caller can claim a pending photo; a concurrent call gets
    /// `AlreadyInProgress`. A photo with a verdict returns it without a new
    /// check. An accepted verdict may start the owner's sample job.
    pub async fn validate(&self, owner_id: DbId, photo_id: DbId) -> PipelineResult<ValidationResult> {
        let photo = self.owned_photo(owner_id, photo_id).await?;
        if validation_gate(photo.id, photo.status()?, photo.is_retired())? == ValidationGate::AlreadyDecided {
            return validation_result(&photo, false);
        }

        let Some(claimed) = PhotoRepo::claim_for_validation(&self.pool, photo.id).await? else {
            let current = self.owned_photo(owner_id, photo_id).await?;
            validation_gate(current.id, current.status()?, current.is_retired())?;
            return validation_result(&current, false);
        };

        // The claim is only released by a recorded verdict, so the check
        // runs on its own task and finishes even if the caller goes away.
        let lifecycle = self.clone();
        tokio::spawn(async move { lifecycle.decide(owner_id, claimed).await })
            .await
            .map_err(|e| CoreError::Internal(format!("Validation of photo {photo_id} aborted: {e}")))?
    }

    /// Check a claimed photo and record its verdict.
    async fn decide(&self, owner_id: DbId, claimed: Photo) -> PipelineResult<ValidationResult> {
        let photo_id = claimed.id;
        let verdict = self.run_check(&claimed).await;
        let photo = match PhotoRepo::record_verdict(
            &self.pool,
            claimed.id,
            verdict.resulting_status(),
            &warnings_to_strings(&verdict.warnings),
        )
        .await?
        {
            Some(updated) => updated,
            None => {
                tracing::warn!(photo_id, "Validation was released before its verdict was recorded");
                self.owned_photo(owner_id, photo_id).await?
            }
        };
        tracing::info!(
            owner_id,
            photo_id,
            is_valid = verdict.is_valid,
            warnings = ?verdict.warnings,
            "Photo validated",
        );

        let sample_started = photo.status()?.is_accepted() && self.maybe_start_sample(owner_id).await;
        validation_result(&photo, sample_started)
    }

    /// Accept a failed photo despite its warnings. Idempotent.
    ///
    /// A bypass that lets the owner proceed may start the sample job.
    pub async fn bypass(&self, owner_id: DbId, photo_id: DbId) -> PipelineResult<BypassResult> {
        let photo = self.owned_photo(owner_id, photo_id).await?;
        if bypass_action(photo.id, photo.status()?, photo.is_retired())? == BypassAction::Noop {
            return Ok(BypassResult {
                photo: PhotoView::try_from(&photo)?,
                sample_generation_started: false,
            });
        }

        let (photo, applied) = match PhotoRepo::bypass(&self.pool, photo.id).await? {
            Some(updated) => {
                tracing::info!(owner_id, photo_id, "Photo bypassed");
                (updated, true)
            }
            None => {
                let current = self.owned_photo(owner_id, photo_id).await?;
                bypass_action(current.id, current.status()?, current.is_retired())?;
                (current, false)
            }
        };

        let sample_generation_started = applied && self.maybe_start_sample(owner_id).await;
        Ok(BypassResult {
            photo: PhotoView::try_from(&photo)?,
            sample_generation_started,
        })
    }

    // -- reads --

    pub async fn list(&self, owner_id: DbId) -> PipelineResult<Vec<PhotoView>> {
        let photos = PhotoRepo::list_active(&self.pool, owner_id).await?;
        Ok(photos
            .iter()
            .map(PhotoView::try_from)
            .collect::<Result<_, _>>()?)
    }

    /// One owned photo, retired ones included.
    pub async fn get(&self, owner_id: DbId, photo_id: DbId) -> PipelineResult<PhotoView> {
        let photo = self.owned_photo(owner_id, photo_id).await?;
        Ok(PhotoView::try_from(&photo)?)
    }

    pub async fn progress(&self, owner_id: DbId) -> PipelineResult<PhotoProgress> {
        let mut conn = self.pool.acquire().await?;
        let photos = active_statuses(&mut *conn, owner_id).await?;
        Ok(PhotoProgress::from_active(&photos))
    }

    pub async fn can_proceed(&self, owner_id: DbId) -> PipelineResult<bool> {
        Ok(self.progress(owner_id).await?.can_proceed)
    }

    // -- internals --

    /// An already-recorded upload, checked against the caller's intent.
    async fn confirmed(
        &self,
        photo: Photo,
        owner_id: DbId,
        storage_key: &str,
        replacing: Option<DbId>,
    ) -> PipelineResult<Photo> {
        if photo.owner_id != owner_id {
            return Err(CoreError::UnknownStorageKey(storage_key.to_string()).into());
        }
        if let Some(old_photo_id) = replacing {
            let old = self.owned_photo(owner_id, old_photo_id).await?;
            if old.replaced_by_photo_id != Some(photo.id) {
                return Err(CoreError::Conflict(format!(
                    "Upload '{storage_key}' is already recorded as photo {}",
                    photo.id
                ))
                .into());
            }
        }
        Ok(photo)
    }

    async fn owned_photo(&self, owner_id: DbId, photo_id: DbId) -> PipelineResult<Photo> {
        Ok(owned(PhotoRepo::find_by_id(&self.pool, photo_id).await?, owner_id, photo_id)?)
    }

    async fn run_check(&self, photo: &Photo) -> Verdict {
        let url = match self.presigner.download(&photo.storage_key).await {
            Ok(url) => url.url,
            Err(e) => {
                tracing::warn!(
                    photo_id = photo.id,
                    error = %e,
                    "Could not presign photo for the vision check, treating photo as valid",
                );
                return Verdict::fallback();
            }
        };
        self.validator
            .check(&ImageRef {
                photo_id: photo.id,
                url,
                content_type: photo.content_type.clone(),
            })
            .await
            .verdict()
    }

    async fn maybe_start_sample(&self, owner_id: DbId) -> bool {
        match self.generation.try_start_sample(owner_id).await {
            Ok(Some(start)) => start.started,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Could not start sample generation");
                false
            }
        }
    }

    fn spawn_validation(&self, owner_id: DbId, photo_id: DbId) {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            if let Err(e) = lifecycle.validate(owner_id, photo_id).await {
                tracing::error!(owner_id, photo_id, error = %e, "Background validation failed");
            }
        });
    }
}

/// `(id, status)` of every active photo of the owner.
pub(crate) async fn active_statuses(
    conn: &mut PgConnection,
    owner_id: DbId,
) -> PipelineResult<Vec<(DbId, PhotoStatus)>> {
    let rows = PhotoRepo::active_statuses(conn, owner_id).await?;
    Ok(rows
        .into_iter()
        .map(|(id, status_id)| PhotoStatus::from_id(status_id).map(|s| (id, s)))
        .collect::<Result<_, _>>()?)
}

fn owned(photo: Option<Photo>, owner_id: DbId, photo_id: DbId) -> Result<Photo, CoreError> {
    photo
        .filter(|p| p.owner_id == owner_id)
        .ok_or(CoreError::NotFound {
            entity: ENTITY,
            id: photo_id,
        })
}

fn validation_result(photo: &Photo, sample_generation_started: bool) -> PipelineResult<ValidationResult> {
    let verdict = photo.verdict()?;
    Ok(ValidationResult {
        photo_id: photo.id,
        is_valid: verdict.is_valid,
        warnings: verdict.warnings,
        status: photo.status()?,
        sample_generation_started,
    })
}
