//! Download URLs for stored images, presigned on read.

use std::sync::Arc;
use std::time::Duration;

use aurapix_core::storage::{ObjectStorage, PresignedUrl, StorageError};
use aurapix_db::models::generated_image::GeneratedImage;
use aurapix_db::models::sample::SampleImage;
use futures::future::try_join_all;

use crate::error::PipelineResult;
use crate::views::ImageView;

#[derive(Clone)]
pub struct Presigner {
    storage: Arc<dyn ObjectStorage>,
    expiry: Duration,
}

impl Presigner {
    pub fn new(storage: Arc<dyn ObjectStorage>, expiry: Duration) -> Self {
        Self { storage, expiry }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub async fn download(&self, key: &str) -> Result<PresignedUrl, StorageError> {
        self.storage.presign_download(key, self.expiry).await
    }

    pub async fn generated(&self, images: &[GeneratedImage]) -> PipelineResult<Vec<ImageView>> {
        let views = try_join_all(images.iter().map(|img| async move {
            let url = self.download(&img.storage_key).await?;
            Ok::<_, StorageError>(ImageView::new(
                img.id,
                &img.scenario,
                url,
                img.selected_profile_order,
            ))
        }))
        .await?;
        Ok(views)
    }

    pub async fn samples(&self, images: &[SampleImage]) -> PipelineResult<Vec<ImageView>> {
        let views = try_join_all(images.iter().map(|img| async move {
            let url = self.download(&img.storage_key).await?;
            Ok::<_, StorageError>(ImageView::new(img.id, &img.scenario, url, None))
        }))
        .await?;
        Ok(views)
    }
}
