//! Submit a job, poll it to completion, validate the result, and resubmit
//! the whole job when the result is rejected.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use asyncjob_core::{FetchError, JobHandle, JobKind, ValidationError};

use crate::clock::{Clock, SystemClock};
use crate::config::{JobPolicy, RetryLimit};
use crate::error::{JobContext, OrchestrationError};
use crate::transport::JobTransport;
use crate::types::{AttemptOutcome, AttemptRecord, OrchestrationResult, RetryBudget};
use crate::validator::Validator;

/// Drives fire-and-poll jobs against a [`JobTransport`].
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs from
/// several threads. Each run has at most one outstanding job at a time.
#[derive(Debug, Clone)]
pub struct AsyncJobOrchestrator<T, C = SystemClock> {
    transport: T,
    clock: C,
    default_policy: JobPolicy,
}

impl<T> AsyncJobOrchestrator<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, SystemClock)
    }
}

impl<T, C: Clock> AsyncJobOrchestrator<T, C> {
    pub fn with_clock(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            default_policy: JobPolicy::default(),
        }
    }

    /// Policy used by [`run_default`](Self::run_default) and for the poll
    /// interval of [`run_once`](Self::run_once).
    pub fn with_default_policy(mut self, policy: JobPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn default_policy(&self) -> &JobPolicy {
        &self.default_policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run with the orchestrator's default policy.
    pub fn run_default<Req, Resp, V>(
        &self,
        kind: &JobKind,
        request: &Req,
        validator: V,
    ) -> Result<OrchestrationResult<Resp>, OrchestrationError>
    where
        T: JobTransport<Req, Resp>,
        V: Validator<Resp>,
    {
        self.run(kind, request, validator, &self.default_policy)
    }

    /// Submit once and poll until the result is accepted; a rejected result
    /// is terminal.
    pub fn run_once<Req, Resp, V>(
        &self,
        kind: &JobKind,
        request: &Req,
        validator: V,
        timeout: Duration,
    ) -> Result<OrchestrationResult<Resp>, OrchestrationError>
    where
        T: JobTransport<Req, Resp>,
        V: Validator<Resp>,
    {
        let policy = self
            .default_policy
            .clone()
            .with_timeout(timeout)
            .with_max_retries(RetryLimit::Bounded(1));
        self.run(kind, request, validator, &policy)
    }

    /// Run one job to an accepted result.
    ///
    /// Each iteration: check the deadline, submit if no job is outstanding,
    /// wait the current interval, fetch, validate.
    ///
    /// - A not-ready fetch polls the same job again at the same interval.
    /// - A rejected result abandons the job and submits a new one after
    ///   growing the interval by `backoff_factor`, while `max_retries` allows.
    /// - Any other transport fault is returned immediately.
    ///
    /// The deadline is only checked at the top of an iteration, so the cycle
    /// in flight when it passes is allowed to finish.
    pub fn run<Req, Resp, V>(
        &self,
        kind: &JobKind,
        request: &Req,
        validator: V,
        policy: &JobPolicy,
    ) -> Result<OrchestrationResult<Resp>, OrchestrationError>
    where
        T: JobTransport<Req, Resp>,
        V: Validator<Resp>,
    {
        let start = self.clock.now();
        let mut budget = RetryBudget::new(start, policy);
        let mut handle: Option<JobHandle> = None;
        let mut last_rejection: Option<ValidationError> = None;
        let mut history: Vec<AttemptRecord> = Vec::new();

        loop {
            if budget.is_expired(self.clock.now()) {
                let context = context_for(kind, &history, budget.tries);
                return Err(match last_rejection.take() {
                    Some(source) => {
                        warn!(%context, error = %source, "deadline passed after rejected result");
                        OrchestrationError::Validation { context, source }
                    }
                    None => {
                        warn!(%context, timeout_ms = policy.timeout.as_millis() as u64, "deadline passed before job finished");
                        OrchestrationError::DeadlineExceeded {
                            context,
                            timeout: policy.timeout,
                        }
                    }
                });
            }

            let current = match &handle {
                Some(h) => h.clone(),
                None => {
                    let submitted = self.transport.submit(kind, request).map_err(|source| {
                        let context = context_for(kind, &history, budget.tries);
                        error!(%context, error = %source, "job submission failed");
                        OrchestrationError::Transport { context, source }
                    })?;
                    budget.record_submission();
                    info!(
                        kind = %kind,
                        handle = %submitted,
                        tries = budget.tries,
                        "job submitted"
                    );
                    let now = Utc::now();
                    history.push(AttemptRecord {
                        attempt: budget.tries,
                        handle: submitted.clone(),
                        started_at: now,
                        finished_at: now,
                        polls: 0,
                        outcome: "submitted",
                        rejection: None,
                    });
                    handle = Some(submitted.clone());
                    submitted
                }
            };

            self.clock.sleep(budget.interval);

            let outcome = self.attempt(kind, &current, request, &validator);
            if let Some(record) = history.last_mut() {
                record.polls += 1;
                record.outcome = outcome.label();
                record.finished_at = Utc::now();
            }
            debug!(kind = %kind, handle = %current, outcome = outcome.label(), "status checked");

            match outcome {
                AttemptOutcome::Pending { reason } => {
                    debug!(kind = %kind, handle = %current, reason = %reason, "job not ready");
                }
                AttemptOutcome::TransportFailure(source) => {
                    let context = context_for(kind, &history, budget.tries);
                    error!(%context, error = %source, "fetching job result failed");
                    return Err(OrchestrationError::Transport { context, source });
                }
                AttemptOutcome::ValidationFailure(rejection) => {
                    if let Some(record) = history.last_mut() {
                        record.rejection = Some(rejection.to_string());
                    }

                    if !budget.can_resubmit() {
                        let context = context_for(kind, &history, budget.tries);
                        warn!(%context, error = %rejection, "result rejected; retries exhausted");
                        return Err(OrchestrationError::RetriesExhausted {
                            context,
                            source: rejection,
                        });
                    }

                    handle = None;
                    budget.back_off();
                    warn!(
                        kind = %kind,
                        handle = %current,
                        tries = budget.tries,
                        interval_ms = budget.interval.as_millis() as u64,
                        error = %rejection,
                        "result rejected; resubmitting job"
                    );
                    last_rejection = Some(rejection);
                }
                AttemptOutcome::Success(result) => {
                    let elapsed = self.clock.now().saturating_duration_since(start);
                    info!(
                        kind = %kind,
                        handle = %current,
                        tries = budget.tries,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "job completed"
                    );
                    return Ok(OrchestrationResult {
                        handle: current,
                        result,
                        tries: budget.tries,
                        elapsed,
                        history,
                    });
                }
            }
        }
    }

    /// One fetch-and-validate cycle against `handle`.
    fn attempt<Req, Resp, V>(
        &self,
        kind: &JobKind,
        handle: &JobHandle,
        request: &Req,
        validator: &V,
    ) -> AttemptOutcome<Resp>
    where
        T: JobTransport<Req, Resp>,
        V: Validator<Resp>,
    {
        match self.transport.fetch_result(kind, handle, request) {
            Ok(result) => match validator.validate(&result) {
                Ok(()) => AttemptOutcome::Success(result),
                Err(rejection) => AttemptOutcome::ValidationFailure(rejection),
            },
            Err(e @ (FetchError::NotReady { .. } | FetchError::TableUnavailable(_))) => {
                AttemptOutcome::Pending {
                    reason: e.to_string(),
                }
            }
            Err(FetchError::Transport(e)) => AttemptOutcome::TransportFailure(e),
        }
    }
}

fn context_for(kind: &JobKind, history: &[AttemptRecord], tries: u32) -> JobContext {
    JobContext {
        kind: kind.clone(),
        handle: history.last().map(|r| r.handle.clone()),
        tries,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use asyncjob_core::TransportError;

    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{FetchStep, ScriptedTransport};
    use crate::validator::{accept_any, ensure_eq};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn policy(timeout: u64, retries: RetryLimit, interval: u64) -> JobPolicy {
        JobPolicy::new(ms(timeout))
            .with_max_retries(retries)
            .with_poll_interval(ms(interval))
    }

    fn orchestrator(
        transport: &Arc<ScriptedTransport<u32>>,
    ) -> (
        AsyncJobOrchestrator<Arc<ScriptedTransport<u32>>, Arc<ManualClock>>,
        Arc<ManualClock>,
    ) {
        let clock = ManualClock::arc();
        (
            AsyncJobOrchestrator::with_clock(transport.clone(), clock.clone()),
            clock,
        )
    }

    #[test]
    fn happy_path_submits_and_fetches_once() {
        let transport = ScriptedTransport::arc().then_job(vec![FetchStep::Ready(7)]);
        let (orch, clock) = orchestrator(&transport);

        let out = orch
            .run(&JobKind::TableQuery, &(), accept_any(), &policy(1_000, RetryLimit::Bounded(1), 100))
            .unwrap();

        assert_eq!(out.result, 7);
        assert_eq!(out.tries, 1);
        assert_eq!(transport.submit_count(), 1);
        assert_eq!(transport.fetch_count(), 1);
        assert_eq!(clock.sleeps(), vec![ms(100)]);
        assert_eq!(out.history.len(), 1);
        assert_eq!(out.history[0].polls, 1);
        assert_eq!(out.history[0].outcome, "success");
    }

    #[test]
    fn unrepresentable_timeout_runs_without_deadline() {
        let transport = ScriptedTransport::arc()
            .then_job(vec![FetchStep::NotReady, FetchStep::Ready(9)]);
        let (orch, clock) = orchestrator(&transport);
        let policy = JobPolicy::new(Duration::MAX).with_poll_interval(ms(100));
        assert!(policy.validate().is_ok());

        let out = orch.run(&JobKind::TableQuery, &(), accept_any(), &policy).unwrap();

        assert_eq!(out.result, 9);
        assert_eq!(clock.sleeps(), vec![ms(100), ms(100)]);
    }

    #[test]
    fn not_ready_polls_same_job_at_constant_interval() {
        let transport = ScriptedTransport::arc().then_job(vec![
            FetchStep::NotReady,
            FetchStep::TableUnavailable,
            FetchStep::NotReady,
            FetchStep::Ready(1),
        ]);
        let (orch, clock) = orchestrator(&transport);

        let out = orch
            .run(&JobKind::TableQuery, &(), accept_any(), &policy(10_000, RetryLimit::Bounded(3), 50))
            .unwrap();

        assert_eq!(out.tries, 1);
        assert_eq!(transport.submit_count(), 1);
        assert_eq!(transport.fetch_count(), 4);
        assert!(clock.sleeps().iter().all(|d| *d == ms(50)));
        let handles = transport.fetched_handles();
        assert!(handles.iter().all(|h| *h == handles[0]));
    }

    #[test]
    fn rejected_results_resubmit_with_backoff() {
        let transport = ScriptedTransport::arc()
            .then_job(vec![FetchStep::Ready(3)])
            .then_job(vec![FetchStep::NotReady, FetchStep::Ready(4)])
            .then_job(vec![FetchStep::Ready(5)]);
        let (orch, clock) = orchestrator(&transport);

        let out = orch
            .run(
                &JobKind::TableQuery,
                &(),
                |count: &u32| ensure_eq("count", 5, *count),
                &policy(5_000, RetryLimit::Bounded(3), 100),
            )
            .unwrap();

        assert_eq!(out.result, 5);
        assert_eq!(out.tries, 3);
        assert_eq!(clock.sleeps(), vec![ms(100), ms(120), ms(120), ms(144)]);
        assert_eq!(transport.submitted_handles().len(), 3);
        assert_eq!(out.handle, transport.submitted_handles()[2]);
        assert_eq!(out.history[0].rejection.as_deref(), Some("count: expected 5, got 3"));
        assert_eq!(out.history[0].outcome, "validation_failure");
        assert_eq!(out.history[1].polls, 2);
        assert!(out.history[2].rejection.is_none());
    }

    #[test]
    fn rejection_is_terminal_once_retries_are_spent() {
        let transport = ScriptedTransport::arc()
            .then_job(vec![FetchStep::Ready(1)])
            .then_job(vec![FetchStep::Ready(2)]);
        let (orch, _clock) = orchestrator(&transport);

        let err = orch
            .run(
                &JobKind::BulkFileDownload,
                &(),
                |n: &u32| ensure_eq("files", 9, *n),
                &policy(5_000, RetryLimit::Bounded(2), 10),
            )
            .unwrap_err();

        match err {
            OrchestrationError::RetriesExhausted { context, source } => {
                assert_eq!(context.tries, 2);
                assert_eq!(context.handle, Some(transport.submitted_handles()[1].clone()));
                assert_eq!(source.actual(), Some("2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.submit_count(), 2);
    }

    #[test]
    fn run_once_does_not_resubmit() {
        let transport = ScriptedTransport::arc().then_job(vec![FetchStep::Ready(1)]);
        let (orch, _clock) = orchestrator(&transport);

        let err = orch
            .run_once(
                &JobKind::TableTransaction,
                &(),
                |n: &u32| ensure_eq("n", 2, *n),
                ms(1_000),
            )
            .unwrap_err();

        assert!(matches!(err, OrchestrationError::RetriesExhausted { .. }));
        assert_eq!(transport.submit_count(), 1);
    }

    #[test]
    fn never_ready_job_exceeds_deadline() {
        let transport = ScriptedTransport::<u32>::arc();
        let (orch, clock) = orchestrator(&transport);

        let err = orch
            .run(&JobKind::DoiMint, &(), accept_any(), &policy(1_000, RetryLimit::Unbounded, 100))
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert_eq!(err.context().tries, 1);
        assert_eq!(transport.submit_count(), 1);
        // 11 checks: the loop only stops once strictly past the deadline.
        assert_eq!(transport.fetch_count(), 11);
        assert_eq!(clock.elapsed(), ms(1_100));
    }

    #[test]
    fn deadline_after_rejection_surfaces_last_rejection() {
        let transport = ScriptedTransport::arc()
            .then_job(vec![FetchStep::Ready(1)])
            .then_job(vec![FetchStep::Ready(2)]);
        let (orch, _clock) = orchestrator(&transport);

        let err = orch
            .run(
                &JobKind::QueryDownloadList,
                &(),
                |n: &u32| ensure_eq("items", 3, *n),
                &policy(500, RetryLimit::Unbounded, 100),
            )
            .unwrap_err();

        match err {
            OrchestrationError::Validation { context, source } => {
                assert_eq!(source.actual(), Some("2"));
                assert!(context.tries >= 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transport_fault_on_fetch_is_fatal() {
        let transport = ScriptedTransport::arc().then_job(vec![
            FetchStep::NotReady,
            FetchStep::Fail(TransportError::Forbidden("no download".into())),
            FetchStep::Ready(1),
        ]);
        let (orch, _clock) = orchestrator(&transport);

        let err = orch
            .run(&JobKind::TableQuery, &(), accept_any(), &policy(5_000, RetryLimit::Unbounded, 10))
            .unwrap_err();

        assert_eq!(
            err.transport_error(),
            Some(&TransportError::Forbidden("no download".into()))
        );
        assert_eq!(transport.fetch_count(), 2);
    }

    #[test]
    fn submit_failure_is_fatal_and_reports_no_handle() {
        let transport = ScriptedTransport::<u32>::arc()
            .failing_submit(TransportError::BadRequest("bad sql".into()));
        let (orch, clock) = orchestrator(&transport);

        let err = orch
            .run(&JobKind::TableQuery, &(), accept_any(), &policy(5_000, RetryLimit::Unbounded, 10))
            .unwrap_err();

        assert_eq!(err.context().handle, None);
        assert_eq!(err.context().tries, 0);
        assert!(err.to_string().contains("handle: none"));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn run_default_uses_configured_policy() {
        let transport = ScriptedTransport::arc().then_job(vec![FetchStep::Ready(1)]);
        let clock = ManualClock::arc();
        let orch = AsyncJobOrchestrator::with_clock(transport.clone(), clock.clone())
            .with_default_policy(policy(1_000, RetryLimit::Bounded(1), 25));

        orch.run_default(&JobKind::S3FileCopy, &(), accept_any()).unwrap();

        assert_eq!(clock.sleeps(), vec![ms(25)]);
    }
}
