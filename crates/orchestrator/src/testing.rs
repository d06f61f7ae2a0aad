//! In-memory transport for tests, benchmarks, and local experiments.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use asyncjob_core::{FetchError, JobHandle, JobKind, TransportError};

use crate::transport::JobTransport;

/// What one `fetch_result` call answers.
#[derive(Debug, Clone)]
pub enum FetchStep<R> {
    Ready(R),
    NotReady,
    TableUnavailable,
    Fail(TransportError),
}

/// Transport driven by one script of fetch steps per submission.
///
/// The n-th submitted job replays the n-th script. Jobs without a script, and
/// jobs whose script has run out, answer `NotReady`.
#[derive(Debug)]
pub struct ScriptedTransport<R> {
    state: Mutex<ScriptState<R>>,
}

#[derive(Debug)]
struct ScriptState<R> {
    scripts: VecDeque<VecDeque<FetchStep<R>>>,
    live: Vec<(JobHandle, VecDeque<FetchStep<R>>)>,
    submit_failure: Option<TransportError>,
    submitted: Vec<JobHandle>,
    fetched: Vec<JobHandle>,
}

impl<R> ScriptedTransport<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                scripts: VecDeque::new(),
                live: Vec::new(),
                submit_failure: None,
                submitted: Vec::new(),
                fetched: Vec::new(),
            }),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Queue the script for the next job that has none yet.
    pub fn then_job(self: Arc<Self>, steps: Vec<FetchStep<R>>) -> Arc<Self> {
        self.lock().scripts.push_back(steps.into());
        self
    }

    /// Make every `submit` call fail with `error`.
    pub fn failing_submit(self: Arc<Self>, error: TransportError) -> Arc<Self> {
        self.lock().submit_failure = Some(error);
        self
    }

    pub fn submit_count(&self) -> usize {
        self.lock().submitted.len()
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetched.len()
    }

    /// Handles issued by `submit`, oldest first.
    pub fn submitted_handles(&self) -> Vec<JobHandle> {
        self.lock().submitted.clone()
    }

    /// Handles passed to `fetch_result`, in call order.
    pub fn fetched_handles(&self) -> Vec<JobHandle> {
        self.lock().fetched.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState<R>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<R> Default for ScriptedTransport<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, R> JobTransport<Req, R> for ScriptedTransport<R>
where
    R: Send,
{
    fn submit(&self, _kind: &JobKind, _request: &Req) -> Result<JobHandle, TransportError> {
        let mut state = self.lock();
        if let Some(error) = &state.submit_failure {
            return Err(error.clone());
        }
        let handle = JobHandle::generate();
        let script = state.scripts.pop_front().unwrap_or_default();
        state.live.push((handle.clone(), script));
        state.submitted.push(handle.clone());
        Ok(handle)
    }

    fn fetch_result(
        &self,
        _kind: &JobKind,
        handle: &JobHandle,
        _request: &Req,
    ) -> Result<R, FetchError> {
        let mut state = self.lock();
        state.fetched.push(handle.clone());

        let step = state
            .live
            .iter_mut()
            .find(|(h, _)| h == handle)
            .ok_or_else(|| TransportError::NotFound(format!("unknown job {handle}")))?
            .1
            .pop_front();

        match step {
            Some(FetchStep::Ready(result)) => Ok(result),
            Some(FetchStep::TableUnavailable) => {
                Err(FetchError::table_unavailable("table index is building"))
            }
            Some(FetchStep::Fail(error)) => Err(FetchError::Transport(error)),
            Some(FetchStep::NotReady) | None => Err(FetchError::not_ready()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_assigned_per_submission() {
        let transport = ScriptedTransport::arc()
            .then_job(vec![FetchStep::Ready("first")])
            .then_job(vec![FetchStep::NotReady, FetchStep::Ready("second")]);
        let kind = JobKind::TableQuery;

        let a = transport.submit(&kind, &()).unwrap();
        let b = transport.submit(&kind, &()).unwrap();

        assert!(transport.fetch_result(&kind, &b, &()).unwrap_err().is_retryable());
        assert_eq!(transport.fetch_result(&kind, &a, &()).unwrap(), "first");
        assert_eq!(transport.fetch_result(&kind, &b, &()).unwrap(), "second");
        assert_eq!(transport.fetch_count(), 3);
    }

    #[test]
    fn unknown_handle_is_a_transport_error() {
        let transport = ScriptedTransport::<u8>::new();
        let err = transport
            .fetch_result(&JobKind::DoiMint, &JobHandle::new("nope"), &())
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(TransportError::NotFound(_))));
    }
}
