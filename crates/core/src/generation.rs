//! Generation job contract and batch outcome policy.
//!
//! The external service runs one job per sample or batch and reports the
//! images it produced per scenario. How a finished job maps onto a batch is
//! decided here:
//!
//! - every requested scenario produced an image -> `completed`
//! - some scenarios produced images -> `completed`, flagged partial
//! - nothing was produced -> `failed`, and the consumed credit is restored

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::{BatchStatus, SampleJobStatus};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// External job contract
// ---------------------------------------------------------------------------

/// Sample previews or the paid full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Sample,
    Full,
}

/// A source photo handed to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceImageRef {
    pub photo_id: DbId,
    /// Short-lived download URL for the photo bytes.
    pub url: String,
}

/// One job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    /// Sample job id or batch id, echoed back for correlation.
    pub reference_id: DbId,
    pub owner_id: DbId,
    pub scenarios: Vec<String>,
    pub source_images: Vec<SourceImageRef>,
}

/// One image produced by the service, already written to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub scenario: String,
    pub storage_key: String,
}

/// Coarse job state reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RemoteJobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Snapshot of a job returned by a status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub state: RemoteJobState,
    #[serde(default)]
    pub outputs: Vec<GeneratedOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Errors from the generation service.
#[derive(Debug, thiserror::Error)]
pub enum GenerationServiceError {
    #[error("Generation service request timed out")]
    Timeout,

    #[error("Generation service unavailable: {0}")]
    Unavailable(String),

    #[error("Generation service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unknown generation job '{0}'")]
    UnknownJob(String),
}

impl From<GenerationServiceError> for CoreError {
    fn from(err: GenerationServiceError) -> Self {
        match err {
            GenerationServiceError::Timeout => CoreError::ExternalServiceTimeout {
                service: "generation",
                detail: err.to_string(),
            },
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// The external image-generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a job and return the service's job id.
    async fn submit(&self, request: &GenerationRequest) -> Result<String, GenerationServiceError>;

    /// Poll a previously submitted job.
    async fn fetch(&self, external_job_id: &str) -> Result<JobSnapshot, GenerationServiceError>;
}

// ---------------------------------------------------------------------------
// Outcome policy
// ---------------------------------------------------------------------------

/// How a finished batch is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    /// Completed with images for only `produced` of `requested` scenarios.
    CompletedPartial { produced: usize, requested: usize },
    /// No images at all.
    Failed,
}

impl BatchOutcome {
    pub fn status(&self) -> BatchStatus {
        match self {
            Self::Completed | Self::CompletedPartial { .. } => BatchStatus::Completed,
            Self::Failed => BatchStatus::Failed,
        }
    }

    /// Only a batch that produced nothing gives its credit back.
    pub fn restores_credit(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::CompletedPartial { .. })
    }

    /// Error recorded on the batch, if any.
    pub fn note(&self, batch_id: DbId) -> Option<String> {
        match self {
            Self::Completed => None,
            Self::CompletedPartial { produced, requested } => Some(
                CoreError::PartialGenerationFailure {
                    batch_id,
                    produced: *produced,
                    requested: *requested,
                }
                .to_string(),
            ),
            Self::Failed => Some("Generation produced no images".to_string()),
        }
    }
}

/// Keep only outputs for requested scenarios.
pub fn requested_outputs(requested: &[String], outputs: &[GeneratedOutput]) -> Vec<GeneratedOutput> {
    outputs
        .iter()
        .filter(|o| requested.iter().any(|r| r == &o.scenario))
        .cloned()
        .collect()
}

/// Classify a finished batch by how many requested scenarios produced at
/// least one image. Outputs for scenarios that were not requested are
/// ignored.
pub fn classify_batch(requested: &[String], outputs: &[GeneratedOutput]) -> BatchOutcome {
    let produced: HashSet<&str> = outputs
        .iter()
        .filter(|o| requested.iter().any(|r| r == &o.scenario))
        .map(|o| o.scenario.as_str())
        .collect();
    let requested_distinct: HashSet<&str> = requested.iter().map(String::as_str).collect();

    match produced.len() {
        0 => BatchOutcome::Failed,
        n if n >= requested_distinct.len() => BatchOutcome::Completed,
        n => BatchOutcome::CompletedPartial {
            produced: n,
            requested: requested_distinct.len(),
        },
    }
}

/// Sample jobs are all-or-nothing from the owner's point of view: any
/// preview image is enough to show the sample.
pub fn classify_sample(outputs: &[GeneratedOutput]) -> SampleJobStatus {
    if outputs.is_empty() {
        SampleJobStatus::Failed
    } else {
        SampleJobStatus::Completed
    }
}

/// A job that has been running longer than `timeout` is finalised with
/// whatever it has produced.
pub fn is_timed_out(started_at: Timestamp, now: Timestamp, timeout: Duration) -> bool {
    match chrono::Duration::from_std(timeout) {
        Ok(limit) => now - started_at > limit,
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scenarios(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("s{i}")).collect()
    }

    fn out(scenario: &str) -> GeneratedOutput {
        GeneratedOutput {
            scenario: scenario.to_string(),
            storage_key: format!("generated/{scenario}.png"),
        }
    }

    #[test]
    fn all_scenarios_produced_is_completed() {
        let req = scenarios(3);
        let outputs = vec![out("s0"), out("s1"), out("s2"), out("s2")];
        let outcome = classify_batch(&req, &outputs);
        assert_eq!(outcome, BatchOutcome::Completed);
        assert_eq!(outcome.status(), BatchStatus::Completed);
        assert!(!outcome.restores_credit());
        assert!(outcome.note(1).is_none());
    }

    #[test]
    fn four_of_six_is_completed_partial() {
        let req = scenarios(6);
        let outputs = vec![out("s0"), out("s1"), out("s3"), out("s5")];
        let outcome = classify_batch(&req, &outputs);
        assert_eq!(
            outcome,
            BatchOutcome::CompletedPartial {
                produced: 4,
                requested: 6
            }
        );
        assert_eq!(outcome.status(), BatchStatus::Completed);
        assert!(outcome.is_partial());
        assert!(!outcome.restores_credit());
        assert_eq!(
            outcome.note(9).unwrap(),
            "Batch 9 produced images for 4 of 6 scenarios"
        );
    }

    #[test]
    fn nothing_produced_fails_and_restores_credit() {
        let outcome = classify_batch(&scenarios(6), &[]);
        assert_eq!(outcome, BatchOutcome::Failed);
        assert_eq!(outcome.status(), BatchStatus::Failed);
        assert!(outcome.restores_credit());
    }

    #[test]
    fn unrequested_outputs_are_ignored() {
        let req = scenarios(2);
        let outputs = vec![out("other")];
        assert_eq!(classify_batch(&req, &outputs), BatchOutcome::Failed);
        assert!(requested_outputs(&req, &outputs).is_empty());
    }

    #[test]
    fn sample_with_any_image_completes() {
        assert_eq!(classify_sample(&[out("studio")]), SampleJobStatus::Completed);
        assert_eq!(classify_sample(&[]), SampleJobStatus::Failed);
    }

    #[test]
    fn timeout_compares_elapsed() {
        let start = chrono::Utc::now();
        let later = start + chrono::Duration::seconds(61);
        assert!(is_timed_out(start, later, Duration::from_secs(60)));
        assert!(!is_timed_out(start, later, Duration::from_secs(120)));
    }

    #[test]
    fn snapshot_defaults_missing_outputs() {
        let snap: JobSnapshot = serde_json::from_str(r#"{"state":"running"}"#).unwrap();
        assert_eq!(snap.state, RemoteJobState::Running);
        assert!(snap.outputs.is_empty());
        assert!(!snap.state.is_terminal());
    }
}
