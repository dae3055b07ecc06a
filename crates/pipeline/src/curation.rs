//! Profile-set curation service.
//!
//! Every mutation runs in a transaction holding the owner's account row
//! lock, so auto-selection and manual edits for one owner never interleave.
//! The partial unique index on `(owner_id, selected_profile_order)` backs
//! the "no duplicate order" rule at the database level.

use aurapix_core::curation::{self, plan_toggle, validate_selection, ProfileSelection, TogglePlan};
use aurapix_core::error::CoreError;
use aurapix_core::status::BatchStatus;
use aurapix_core::types::DbId;
use aurapix_db::models::generated_image::GeneratedImage;
use aurapix_db::repositories::{AccountRepo, BatchRepo, GeneratedImageRepo};
use sqlx::{PgConnection, PgPool};

use crate::error::PipelineResult;
use crate::presign::Presigner;
use crate::views::ImageView;

const IMAGE_ENTITY: &str = "GeneratedImage";

#[derive(Clone)]
pub struct CurationService {
    pool: PgPool,
    presigner: Presigner,
}

impl CurationService {
    pub fn new(pool: PgPool, presigner: Presigner) -> Self {
        Self { pool, presigner }
    }

    /// Auto-select the profile set from a completed batch.
    ///
    /// Runs at most once per batch (`curated_at`) and does nothing when the
    /// owner already has any selected image. Returns the selections made.
    pub async fn auto_select(&self, batch_id: DbId) -> PipelineResult<Vec<ProfileSelection>> {
        let batch = BatchRepo::find_by_id(&self.pool, batch_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Batch",
                id: batch_id,
            })?;
        if batch.status()? != BatchStatus::Completed {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, batch.owner_id).await?;

        if !BatchRepo::mark_curated(&mut *tx, batch.id).await? {
            return Ok(Vec::new());
        }

        let existing = GeneratedImageRepo::list_selected(&mut *tx, batch.owner_id).await?;
        if !existing.is_empty() {
            tx.commit().await?;
            tracing::info!(
                batch_id,
                owner_id = batch.owner_id,
                selected = existing.len(),
                "Owner already has a profile selection, skipping auto-selection",
            );
            return Ok(Vec::new());
        }

        let images = GeneratedImageRepo::list_for_batch(&mut *tx, batch.id).await?;
        let candidates: Vec<_> = images.iter().map(GeneratedImage::candidate).collect();
        let selections = curation::auto_select(&batch.scenarios, &candidates);
        for s in &selections {
            GeneratedImageRepo::set_order(&mut *tx, batch.owner_id, s.generated_image_id, Some(s.order))
                .await?;
        }
        tx.commit().await?;

        tracing::info!(
            batch_id,
            owner_id = batch.owner_id,
            selected = selections.len(),
            available = images.len(),
            "Profile set auto-selected",
        );
        Ok(selections)
    }

    /// Replace the owner's whole selection. An empty list clears it.
    pub async fn set_selection(
        &self,
        owner_id: DbId,
        selections: &[ProfileSelection],
    ) -> PipelineResult<Vec<ImageView>> {
        validate_selection(selections)?;

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        let ids: Vec<DbId> = selections.iter().map(|s| s.generated_image_id).collect();
        let owned = GeneratedImageRepo::owned_ids(&mut *tx, owner_id, &ids).await?;
        if let Some(missing) = ids.iter().find(|id| !owned.contains(id)) {
            return Err(CoreError::NotFound {
                entity: IMAGE_ENTITY,
                id: *missing,
            }
            .into());
        }

        GeneratedImageRepo::clear_selection(&mut *tx, owner_id).await?;
        for s in selections {
            GeneratedImageRepo::set_order(&mut *tx, owner_id, s.generated_image_id, Some(s.order))
                .await?;
        }
        let selected = GeneratedImageRepo::list_selected(&mut *tx, owner_id).await?;
        tx.commit().await?;

        tracing::info!(owner_id, selected = selected.len(), "Profile selection replaced");
        self.presigner.generated(&selected).await
    }

    /// Select or deselect one image.
    ///
    /// A selected image is cleared. Otherwise it takes `order` (evicting the
    /// image holding it) or the smallest free order.
    pub async fn toggle(
        &self,
        owner_id: DbId,
        image_id: DbId,
        order: Option<i16>,
    ) -> PipelineResult<Vec<ImageView>> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut *tx, owner_id).await?;

        if GeneratedImageRepo::owned_ids(&mut *tx, owner_id, &[image_id])
            .await?
            .is_empty()
        {
            return Err(CoreError::NotFound {
                entity: IMAGE_ENTITY,
                id: image_id,
            }
            .into());
        }

        let current: Vec<ProfileSelection> = GeneratedImageRepo::list_selected(&mut *tx, owner_id)
            .await?
            .iter()
            .filter_map(|img| {
                img.selected_profile_order.map(|order| ProfileSelection {
                    generated_image_id: img.id,
                    order,
                })
            })
            .collect();

        match plan_toggle(image_id, order, &current)? {
            TogglePlan::Clear => {
                GeneratedImageRepo::set_order(&mut *tx, owner_id, image_id, None).await?;
            }
            TogglePlan::Assign { order, evict } => {
                if let Some(evicted) = evict {
                    GeneratedImageRepo::set_order(&mut *tx, owner_id, evicted, None).await?;
                }
                GeneratedImageRepo::set_order(&mut *tx, owner_id, image_id, Some(order)).await?;
            }
        }
        let selected = GeneratedImageRepo::list_selected(&mut *tx, owner_id).await?;
        tx.commit().await?;

        self.presigner.generated(&selected).await
    }

    /// The owner's profile set ordered by `selectedProfileOrder`.
    pub async fn profile_photos(&self, owner_id: DbId) -> PipelineResult<Vec<ImageView>> {
        let mut conn = self.pool.acquire().await?;
        let selected = GeneratedImageRepo::list_selected(&mut *conn, owner_id).await?;
        self.presigner.generated(&selected).await
    }
}

/// Take the owner's account row lock for the rest of the transaction.
pub(crate) async fn lock_owner(conn: &mut PgConnection, owner_id: DbId) -> PipelineResult<()> {
    if AccountRepo::lock(conn, owner_id).await? {
        Ok(())
    } else {
        Err(CoreError::NotFound {
            entity: "Account",
            id: owner_id,
        }
        .into())
    }
}
