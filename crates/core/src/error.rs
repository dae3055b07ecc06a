use crate::types::DbId;

/// Domain error shared by every layer above the core crate.
///
/// The first six variants are generic; the rest name the failure modes
/// of the photo, credit, and generation flows so callers can decide
/// between rejecting, retrying, and absorbing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The owner already holds the maximum number of active photos
    /// (counting upload slots that have not been confirmed yet).
    #[error("Photo limit reached: {active} active and {in_flight} pending uploads (limit {limit})")]
    QuotaExceeded {
        active: i64,
        in_flight: i64,
        limit: i64,
    },

    /// No upload slot was issued for this storage key (or it belongs to
    /// another owner).
    #[error("No upload slot for storage key '{0}'")]
    UnknownStorageKey(String),

    /// A validation for this photo is already running.
    #[error("Validation already in progress for photo {photo_id}")]
    AlreadyInProgress { photo_id: DbId },

    #[error("Invalid state transition for {entity} {id}: {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        id: DbId,
        from: &'static str,
        to: &'static str,
    },

    /// Generation was requested without an unredeemed credit.
    #[error("No unredeemed purchase credit is available")]
    CreditNotAvailable,

    /// The credit was consumed by another request first. Callers must
    /// re-check access before trying again.
    #[error("Credit {credit_id} has already been redeemed")]
    CreditAlreadyRedeemed { credit_id: DbId },

    #[error("External service '{service}' did not respond in time: {detail}")]
    ExternalServiceTimeout {
        service: &'static str,
        detail: String,
    },

    /// A batch finished with images for only some of its scenarios.
    #[error("Batch {batch_id} produced images for {produced} of {requested} scenarios")]
    PartialGenerationFailure {
        batch_id: DbId,
        produced: usize,
        requested: usize,
    },
}
