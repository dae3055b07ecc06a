use aurapix_core::error::CoreError;
use aurapix_core::generation::GenerationServiceError;
use aurapix_core::purchase::PurchaseError;
use aurapix_core::storage::StorageError;

/// Error returned by the coordinating services.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        Self::Core(err.into())
    }
}

impl From<GenerationServiceError> for PipelineError {
    fn from(err: GenerationServiceError) -> Self {
        Self::Core(err.into())
    }
}

impl From<PurchaseError> for PipelineError {
    fn from(err: PurchaseError) -> Self {
        Self::Core(err.into())
    }
}

impl PipelineError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) => Some(e),
            Self::Database(_) => None,
        }
    }
}
