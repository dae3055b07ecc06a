//! Photo lifecycle rules: warnings, verdicts, the per-photo state machine,
//! the active-photo quota, and the progression gate.
//!
//! ```text
//! pending -> validating -> validated
//!                       -> failed -> bypassed
//! (any) -> retired      (via replace; terminal)
//! ```
//!
//! Retirement is tracked separately from the validation status so the last
//! verdict of a replaced photo stays on record.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::PhotoStatus;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of active (non-retired) photos per owner.
pub const MAX_ACTIVE_PHOTOS: i64 = 10;

/// Minimum number of accepted photos before generation may start.
pub const MIN_ACCEPTED_PHOTOS: usize = 1;

const ENTITY: &str = "Photo";

// ---------------------------------------------------------------------------
// Warnings and verdicts
// ---------------------------------------------------------------------------

/// Content problem reported by the vision check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MultipleSubjects,
    FaceObscured,
    PoorLighting,
    IsScreenshot,
    FacePartiallyObscured,
}

impl WarningKind {
    pub const ALL: [WarningKind; 5] = [
        Self::MultipleSubjects,
        Self::FaceObscured,
        Self::PoorLighting,
        Self::IsScreenshot,
        Self::FacePartiallyObscured,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleSubjects => "multiple_subjects",
            Self::FaceObscured => "face_obscured",
            Self::PoorLighting => "poor_lighting",
            Self::IsScreenshot => "is_screenshot",
            Self::FacePartiallyObscured => "face_partially_obscured",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.as_str() == value)
    }

    /// Blocking warnings make a photo fail validation. The others are
    /// advisory and are recorded on an otherwise valid photo.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::MultipleSubjects | Self::FaceObscured | Self::IsScreenshot
        )
    }
}

/// Outcome of checking one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_valid: bool,
    pub warnings: Vec<WarningKind>,
}

impl Verdict {
    /// Build a verdict from a reported validity flag and warning list.
    ///
    /// Warnings are de-duplicated and sorted. A blocking warning forces
    /// `is_valid = false` regardless of the reported flag.
    pub fn new(reported_valid: bool, mut warnings: Vec<WarningKind>) -> Self {
        warnings.sort();
        warnings.dedup();
        let blocked = warnings.iter().any(|w| w.is_blocking());
        Self {
            is_valid: reported_valid && !blocked,
            warnings,
        }
    }

    /// Verdict used when the vision check could not be reached.
    pub fn fallback() -> Self {
        Self {
            is_valid: true,
            warnings: Vec::new(),
        }
    }

    /// The status a photo moves to once this verdict is recorded.
    pub fn resulting_status(&self) -> PhotoStatus {
        if self.is_valid {
            PhotoStatus::Validated
        } else {
            PhotoStatus::Failed
        }
    }
}

/// Parse warnings stored as text, skipping values this build does not know.
pub fn parse_warnings(values: &[String]) -> Vec<WarningKind> {
    values.iter().filter_map(|v| WarningKind::parse(v)).collect()
}

/// Render warnings for a `TEXT[]` column.
pub fn warnings_to_strings(warnings: &[WarningKind]) -> Vec<String> {
    warnings.iter().map(|w| w.as_str().to_string()).collect()
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// What a `validate` call should do given the photo's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationGate {
    /// The photo is pending: claim it (move to `validating`) and run the check.
    Claim,
    /// A verdict already exists; return it without calling the vision check.
    AlreadyDecided,
}

/// Decide how to handle a `validate` request.
///
/// A photo that is already `validating` is rejected so a concurrent call
/// never starts a second external check.
pub fn validation_gate(
    photo_id: DbId,
    status: PhotoStatus,
    retired: bool,
) -> Result<ValidationGate, CoreError> {
    if retired {
        return Err(retired_transition(photo_id, PhotoStatus::Validating));
    }
    match status {
        PhotoStatus::Pending => Ok(ValidationGate::Claim),
        PhotoStatus::Validating => Err(CoreError::AlreadyInProgress { photo_id }),
        PhotoStatus::Validated | PhotoStatus::Failed | PhotoStatus::Bypassed => {
            Ok(ValidationGate::AlreadyDecided)
        }
    }
}

/// What a `bypass` request should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassAction {
    Apply,
    /// Already bypassed; nothing to change.
    Noop,
}

/// Bypass is only legal from `failed`, and idempotent once applied.
pub fn bypass_action(
    photo_id: DbId,
    status: PhotoStatus,
    retired: bool,
) -> Result<BypassAction, CoreError> {
    if retired {
        return Err(retired_transition(photo_id, PhotoStatus::Bypassed));
    }
    match status {
        PhotoStatus::Failed => Ok(BypassAction::Apply),
        PhotoStatus::Bypassed => Ok(BypassAction::Noop),
        other => Err(CoreError::InvalidStateTransition {
            entity: ENTITY,
            id: photo_id,
            from: other.name(),
            to: PhotoStatus::Bypassed.name(),
        }),
    }
}

/// Any active photo may be replaced; a retired one may not.
pub fn ensure_replaceable(photo_id: DbId, retired: bool) -> Result<(), CoreError> {
    if retired {
        Err(CoreError::InvalidStateTransition {
            entity: ENTITY,
            id: photo_id,
            from: "retired",
            to: "retired",
        })
    } else {
        Ok(())
    }
}

fn retired_transition(photo_id: DbId, to: PhotoStatus) -> CoreError {
    CoreError::InvalidStateTransition {
        entity: ENTITY,
        id: photo_id,
        from: "retired",
        to: to.name(),
    }
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

/// Check whether a new upload slot may be issued.
///
/// Replacement slots are one-for-one with an existing active photo and do
/// not count against the limit.
pub fn check_upload_quota(active: i64, in_flight: i64, is_replacement: bool) -> Result<(), CoreError> {
    if is_replacement {
        return Ok(());
    }
    if active + in_flight + 1 > MAX_ACTIVE_PHOTOS {
        return Err(CoreError::QuotaExceeded {
            active,
            in_flight,
            limit: MAX_ACTIVE_PHOTOS,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Per-owner summary of the active photo set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoProgress {
    pub total_active: usize,
    pub pending: usize,
    pub validating: usize,
    pub validated: usize,
    pub failed: usize,
    pub bypassed: usize,
    pub can_proceed: bool,
    /// Failed photos that must be bypassed or replaced before continuing.
    pub blocking_photo_ids: Vec<DbId>,
}

impl PhotoProgress {
    /// Summarise the active photos of one owner.
    ///
    /// `can_proceed` holds iff nothing is pending or validating, nothing is
    /// failed, and at least [`MIN_ACCEPTED_PHOTOS`] are validated or bypassed.
    pub fn from_active(photos: &[(DbId, PhotoStatus)]) -> Self {
        let mut progress = Self {
            total_active: photos.len(),
            ..Self::default()
        };
        for &(id, status) in photos {
            match status {
                PhotoStatus::Pending => progress.pending += 1,
                PhotoStatus::Validating => progress.validating += 1,
                PhotoStatus::Validated => progress.validated += 1,
                PhotoStatus::Failed => {
                    progress.failed += 1;
                    progress.blocking_photo_ids.push(id);
                }
                PhotoStatus::Bypassed => progress.bypassed += 1,
            }
        }
        progress.blocking_photo_ids.sort_unstable();
        progress.can_proceed = progress.pending == 0
            && progress.validating == 0
            && progress.failed == 0
            && progress.validated + progress.bypassed >= MIN_ACCEPTED_PHOTOS;
        progress
    }
}

/// Shorthand for [`PhotoProgress::from_active`]`(..).can_proceed`.
pub fn can_proceed(photos: &[(DbId, PhotoStatus)]) -> bool {
    PhotoProgress::from_active(photos).can_proceed
}

/// Fingerprint of the accepted photo set: sorted, de-duplicated ids joined
/// by commas. Two sample requests with the same fingerprint are the same
/// request.
pub fn accepted_set_fingerprint(photos: &[(DbId, PhotoStatus)]) -> String {
    let mut ids: Vec<DbId> = photos
        .iter()
        .filter(|(_, s)| s.is_accepted())
        .map(|(id, _)| *id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
