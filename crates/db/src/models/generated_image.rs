use aurapix_core::curation::CurationCandidate;
use aurapix_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `generated_images` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GeneratedImage {
    pub id: DbId,
    pub batch_id: DbId,
    pub owner_id: DbId,
    pub scenario: String,
    pub storage_key: String,
    pub selected_profile_order: Option<i16>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GeneratedImage {
    pub fn candidate(&self) -> CurationCandidate {
        CurationCandidate {
            image_id: self.id,
            scenario: self.scenario.clone(),
        }
    }
}
