//! Bounded calls to the vision check.
//!
//! Each attempt is capped by a timeout; failed attempts are retried with
//! exponential backoff. When every attempt fails the photo is treated as
//! valid with no warnings, and the decision is logged at `warn`.

use std::sync::Arc;
use std::time::Duration;

use aurapix_core::photo::Verdict;
use aurapix_core::retry::RetryPolicy;
use aurapix_core::vision::{ImageRef, VisionClient, VisionError};

/// Result of running the vision check under the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Checked(Verdict),
    /// The check never answered; the photo is accepted anyway.
    Fallback { attempts: u32, last_error: String },
}

impl CheckOutcome {
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Checked(v) => v.clone(),
            Self::Fallback { .. } => Verdict::fallback(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Wraps a [`VisionClient`] with a per-attempt timeout and retries.
#[derive(Clone)]
pub struct ValidationEngine {
    client: Arc<dyn VisionClient>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl ValidationEngine {
    pub fn new(client: Arc<dyn VisionClient>, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            client,
            policy,
            attempt_timeout,
        }
    }

    /// Run the check. Never fails: exhaustion yields [`CheckOutcome::Fallback`].
    pub async fn check(&self, image: &ImageRef) -> CheckOutcome {
        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result = tokio::time::timeout(self.attempt_timeout, self.client.check(image)).await;
            match result {
                Ok(Ok(verdict)) => {
                    tracing::debug!(
                        photo_id = image.photo_id,
                        attempt,
                        is_valid = verdict.is_valid,
                        "Vision check answered",
                    );
                    return CheckOutcome::Checked(verdict);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = VisionError::Timeout.to_string(),
            }

            tracing::debug!(
                photo_id = image.photo_id,
                attempt,
                error = %last_error,
                "Vision check attempt failed",
            );
            if attempt < attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        tracing::warn!(
            photo_id = image.photo_id,
            attempts,
            error = %last_error,
            "Vision check unavailable, treating photo as valid",
        );
        CheckOutcome::Fallback {
            attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use aurapix_core::photo::WarningKind;

    use super::*;

    /// Fails `failures` times, then answers with `verdict`.
    struct FlakyVision {
        failures: u32,
        calls: AtomicU32,
        verdict: Verdict,
        hang: bool,
    }

    impl FlakyVision {
        fn new(failures: u32, verdict: Verdict) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                verdict,
                hang: false,
            }
        }
    }

    #[async_trait]
    impl VisionClient for FlakyVision {
        async fn check(&self, _image: &ImageRef) -> Result<Verdict, VisionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.hang {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if call <= self.failures {
                return Err(VisionError::Unavailable(format!("call {call}")));
            }
            Ok(self.verdict.clone())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        }
    }

    fn image() -> ImageRef {
        ImageRef {
            photo_id: 11,
            url: "https://storage.test/photos/1/a.jpg".into(),
            content_type: "image/jpeg".into(),
        }
    }

    #[tokio::test]
    async fn first_answer_is_returned() {
        let vision = Arc::new(FlakyVision::new(0, Verdict::new(false, vec![WarningKind::FaceObscured])));
        let engine = ValidationEngine::new(vision.clone(), fast_policy(3), Duration::from_secs(1));

        let outcome = engine.check(&image()).await;
        assert_matches!(outcome, CheckOutcome::Checked(ref v) if !v.is_valid);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let vision = Arc::new(FlakyVision::new(2, Verdict::new(true, vec![])));
        let engine = ValidationEngine::new(vision.clone(), fast_policy(3), Duration::from_secs(1));

        let outcome = engine.check(&image()).await;
        assert_matches!(outcome, CheckOutcome::Checked(ref v) if v.is_valid);
        assert_eq!(vision.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_falls_back_to_valid() {
        let vision = Arc::new(FlakyVision::new(10, Verdict::new(false, vec![])));
        let engine = ValidationEngine::new(vision.clone(), fast_policy(2), Duration::from_secs(1));

        let outcome = engine.check(&image()).await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.verdict(), Verdict::fallback());
        assert_matches!(outcome, CheckOutcome::Fallback { attempts: 2, ref last_error } if last_error.contains("call 2"));
        assert_eq!(vision.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_answers_count_as_timeouts() {
        let mut flaky = FlakyVision::new(0, Verdict::new(true, vec![]));
        flaky.hang = true;
        let engine = ValidationEngine::new(Arc::new(flaky), fast_policy(2), Duration::from_millis(20));

        let outcome = engine.check(&image()).await;
        assert_matches!(outcome, CheckOutcome::Fallback { ref last_error, .. } if last_error.contains("timed out"));
    }
}
