//! Repository for the `generated_images` table, including profile-set
//! selection (`selected_profile_order`).

use aurapix_core::generation::GeneratedOutput;
use aurapix_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::generated_image::GeneratedImage;

const COLUMNS: &str = "\
    id, batch_id, owner_id, scenario, storage_key, selected_profile_order, \
    created_at, updated_at";

/// Provides persistence for generated images.
pub struct GeneratedImageRepo;

impl GeneratedImageRepo {
    /// Record outputs for a batch. Outputs already recorded are skipped.
    /// Returns the number of new rows.
    pub async fn insert_outputs(
        pool: &PgPool,
        batch_id: DbId,
        owner_id: DbId,
        outputs: &[GeneratedOutput],
    ) -> Result<u64, sqlx::Error> {
        if outputs.is_empty() {
            return Ok(0);
        }
        let scenarios: Vec<&str> = outputs.iter().map(|o| o.scenario.as_str()).collect();
        let keys: Vec<&str> = outputs.iter().map(|o| o.storage_key.as_str()).collect();
        let result = sqlx::query(
            "INSERT INTO generated_images (batch_id, owner_id, scenario, storage_key) \
             SELECT $1, $2, s.scenario, s.storage_key \
             FROM UNNEST($3::TEXT[], $4::TEXT[]) AS s(scenario, storage_key) \
             ON CONFLICT (batch_id, storage_key) DO NOTHING",
        )
        .bind(batch_id)
        .bind(owner_id)
        .bind(&scenarios)
        .bind(&keys)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Images of a batch in insertion order.
    pub async fn list_for_batch(
        conn: &mut PgConnection,
        batch_id: DbId,
    ) -> Result<Vec<GeneratedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_images WHERE batch_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(batch_id)
            .fetch_all(conn)
            .await
    }

    /// Images of several batches, grouped by batch then insertion order.
    pub async fn list_for_batches(
        pool: &PgPool,
        batch_ids: &[DbId],
    ) -> Result<Vec<GeneratedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_images WHERE batch_id = ANY($1) ORDER BY batch_id, id"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(batch_ids)
            .fetch_all(pool)
            .await
    }

    /// The owner's selected images ordered by `selected_profile_order`.
    pub async fn list_selected(
        conn: &mut PgConnection,
        owner_id: DbId,
    ) -> Result<Vec<GeneratedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_images \
             WHERE owner_id = $1 AND selected_profile_order IS NOT NULL \
             ORDER BY selected_profile_order"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(owner_id)
            .fetch_all(conn)
            .await
    }

    /// Ids among `ids` that belong to `owner_id`.
    pub async fn owned_ids(
        conn: &mut PgConnection,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM generated_images WHERE owner_id = $1 AND id = ANY($2)",
        )
        .bind(owner_id)
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Clear every selection of an owner.
    pub async fn clear_selection(conn: &mut PgConnection, owner_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generated_images SET selected_profile_order = NULL \
             WHERE owner_id = $1 AND selected_profile_order IS NOT NULL",
        )
        .bind(owner_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set or clear the order of one owned image.
    pub async fn set_order(
        conn: &mut PgConnection,
        owner_id: DbId,
        image_id: DbId,
        order: Option<i16>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generated_images SET selected_profile_order = $3 \
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(image_id)
        .bind(owner_id)
        .bind(order)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
