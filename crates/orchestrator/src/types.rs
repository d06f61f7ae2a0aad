//! State carried through one orchestration run and the value it returns.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use asyncjob_core::{JobHandle, TransportError, ValidationError};

use crate::config::{JobPolicy, RetryLimit};

/// Result of one fetch-and-validate cycle.
#[derive(Debug)]
pub enum AttemptOutcome<R> {
    /// The job has no result yet (still processing, or its table is
    /// still being built).
    Pending { reason: String },
    /// Fatal remote fault.
    TransportFailure(TransportError),
    /// The job finished but its result was rejected.
    ValidationFailure(ValidationError),
    /// The job finished and its result was accepted.
    Success(R),
}

impl<R> AttemptOutcome<R> {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Pending { .. } => "pending",
            AttemptOutcome::TransportFailure(_) => "transport_failure",
            AttemptOutcome::ValidationFailure(_) => "validation_failure",
            AttemptOutcome::Success(_) => "success",
        }
    }
}

/// Mutable counters for one run.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    /// Number of submissions made so far.
    pub tries: u32,
    /// Current wait before each status check.
    pub interval: Duration,
    /// Absolute instant after which no new iteration starts. `None` when the
    /// timeout is too large to represent, which never expires.
    pub deadline: Option<Instant>,
    max_retries: RetryLimit,
    backoff_factor: f64,
}

impl RetryBudget {
    pub fn new(start: Instant, policy: &JobPolicy) -> Self {
        Self {
            tries: 0,
            interval: policy.poll_interval,
            deadline: start.checked_add(policy.timeout),
            max_retries: policy.max_retries,
            backoff_factor: policy.backoff_factor,
        }
    }

    pub fn record_submission(&mut self) {
        self.tries += 1;
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    pub fn can_resubmit(&self) -> bool {
        self.max_retries.allows_another(self.tries)
    }

    /// Grow the interval after a rejected result.
    pub fn back_off(&mut self) {
        self.interval = scale(self.interval, self.backoff_factor);
    }
}

/// Multiply `interval` by `factor`, rounding to the nearest nanosecond.
///
/// Never shrinks the interval.
pub(crate) fn scale(interval: Duration, factor: f64) -> Duration {
    let factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
    if factor == 1.0 {
        return interval;
    }
    let nanos = (interval.as_nanos() as f64 * factor).round();
    if nanos >= u64::MAX as f64 {
        return Duration::try_from_secs_f64(interval.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
            .max(interval);
    }
    Duration::from_nanos(nanos as u64).max(interval)
}

/// One submitted job, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// Submission number (1-indexed).
    pub attempt: u32,
    pub handle: JobHandle,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Number of status checks made against this job.
    pub polls: u32,
    /// Label of the latest fetch-and-validate outcome for this job
    /// (`submitted` until the first status check).
    pub outcome: &'static str,
    /// `None` when the run ended while this job was still pending.
    pub rejection: Option<String>,
}

/// Returned on success: the accepted result and the job that produced it.
#[derive(Debug, Clone)]
pub struct OrchestrationResult<R> {
    /// Handle of the job whose result was accepted.
    pub handle: JobHandle,
    pub result: R,
    /// Number of submissions made, including the accepted one.
    pub tries: u32,
    pub elapsed: Duration,
    /// Every job submitted during the run, oldest first.
    pub history: Vec<AttemptRecord>,
}

impl<R> OrchestrationResult<R> {
    pub fn into_result(self) -> R {
        self.result
    }

    pub fn into_parts(self) -> (JobHandle, R) {
        (self.handle, self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_grows_interval_by_factor() {
        let policy = JobPolicy::default()
            .with_poll_interval(Duration::from_millis(100))
            .with_backoff_factor(1.2);
        let mut budget = RetryBudget::new(Instant::now(), &policy);

        budget.back_off();
        assert_eq!(budget.interval, Duration::from_millis(120));
        budget.back_off();
        assert_eq!(budget.interval, Duration::from_millis(144));
    }

    #[test]
    fn budget_tracks_tries_against_limit() {
        let policy = JobPolicy::default().with_max_retries(RetryLimit::Bounded(2));
        let mut budget = RetryBudget::new(Instant::now(), &policy);

        budget.record_submission();
        assert!(budget.can_resubmit());
        budget.record_submission();
        assert!(!budget.can_resubmit());
    }

    #[test]
    fn unrepresentable_timeout_never_expires() {
        let start = Instant::now();
        let policy = JobPolicy::new(Duration::MAX);
        assert!(policy.validate().is_ok());

        let budget = RetryBudget::new(start, &policy);

        assert!(budget.deadline.is_none());
        assert!(!budget.is_expired(start + Duration::from_secs(86_400 * 365)));
    }

    #[test]
    fn scaling_a_huge_interval_never_shrinks_it() {
        let huge = Duration::from_secs(u64::MAX / 1_000_000_000 + 10);

        assert_eq!(scale(huge, 1.0), huge);
        assert!(scale(huge, 1.2) >= huge);
        assert_eq!(scale(Duration::MAX, 1.2), Duration::MAX);
    }

    #[test]
    fn outcome_labels_are_stable() {
        let pending: AttemptOutcome<()> = AttemptOutcome::Pending { reason: "queued".into() };
        assert_eq!(pending.label(), "pending");
        assert_eq!(AttemptOutcome::Success(()).label(), "success");
        assert_eq!(
            AttemptOutcome::<()>::ValidationFailure(ValidationError::new("stale")).label(),
            "validation_failure"
        );
    }

    #[test]
    fn deadline_is_exclusive() {
        let start = Instant::now();
        let policy = JobPolicy::new(Duration::from_millis(50));
        let budget = RetryBudget::new(start, &policy);

        assert!(!budget.is_expired(start + Duration::from_millis(50)));
        assert!(budget.is_expired(start + Duration::from_millis(51)));
    }
}
