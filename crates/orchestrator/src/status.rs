//! Poll a job's reported status until it completes or fails.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use asyncjob_core::JobHandle;

use crate::clock::Clock;

/// State of a remote job as reported by its status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Processing,
    Failed,
    Complete,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Complete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    #[serde(rename = "jobId")]
    pub handle: JobHandle,
    #[serde(rename = "jobState")]
    pub state: JobState,
    #[serde(default)]
    pub progress_message: Option<String>,
    #[serde(default)]
    pub progress_current: Option<u64>,
    #[serde(default)]
    pub progress_total: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl JobStatusReport {
    pub fn new(handle: JobHandle, state: JobState) -> Self {
        Self {
            handle,
            state,
            progress_message: None,
            progress_current: None,
            progress_total: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn with_progress(mut self, message: impl Into<String>, current: u64, total: u64) -> Self {
        self.progress_message = Some(message.into());
        self.progress_current = Some(current);
        self.progress_total = Some(total);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>, details: Option<String>) -> Self {
        self.error_message = Some(message.into());
        self.error_details = details;
        self
    }
}

#[derive(Debug, Error)]
pub enum StatusWaitError<E> {
    #[error("job {handle} failed: {message}")]
    Failed {
        handle: JobHandle,
        message: String,
        details: Option<String>,
    },

    #[error("timed out after {waited:?} waiting for job {handle} (last progress: {})", progress_or_none(.last_progress))]
    TimedOut {
        handle: JobHandle,
        waited: Duration,
        last_progress: Option<String>,
    },

    #[error("fetching job status failed: {0}")]
    Fetch(E),
}

fn progress_or_none(progress: &Option<String>) -> &str {
    progress.as_deref().unwrap_or("none")
}

/// Fetch a job's status every `interval` until it reports `COMPLETE`.
///
/// A `FAILED` report stops the wait immediately with the reported error.
pub fn wait_for_completion<C, E, F>(
    clock: &C,
    timeout: Duration,
    interval: Duration,
    mut fetch: F,
) -> Result<JobStatusReport, StatusWaitError<E>>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<JobStatusReport, E>,
{
    let start = clock.now();
    loop {
        let report = fetch().map_err(StatusWaitError::Fetch)?;
        match report.state {
            JobState::Complete => return Ok(report),
            JobState::Failed => {
                return Err(StatusWaitError::Failed {
                    message: report
                        .error_message
                        .unwrap_or_else(|| "no error message reported".to_string()),
                    details: report.error_details,
                    handle: report.handle,
                });
            }
            JobState::Processing => {
                debug!(
                    handle = %report.handle,
                    progress = report.progress_message.as_deref().unwrap_or(""),
                    "waiting for job"
                );
            }
        }

        let waited = clock.now().saturating_duration_since(start);
        if waited > timeout {
            return Err(StatusWaitError::TimedOut {
                handle: report.handle,
                waited,
                last_progress: report.progress_message,
            });
        }
        clock.sleep(interval);
    }
}
