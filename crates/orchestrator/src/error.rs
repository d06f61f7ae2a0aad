//! Terminal failures of an orchestration run.

use std::time::Duration;

use thiserror::Error;

use asyncjob_core::{JobHandle, JobKind, TransportError, ValidationError};

/// Where a run stood when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub kind: JobKind,
    /// Last submitted job, if any.
    pub handle: Option<JobHandle>,
    /// Submissions made.
    pub tries: u32,
}

impl core::fmt::Display for JobContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.handle {
            Some(handle) => write!(
                f,
                "{} job (handle: {}, tries: {})",
                self.kind, handle, self.tries
            ),
            None => write!(f, "{} job (handle: none, tries: {})", self.kind, self.tries),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The budget ran out before any result was rejected: the job never
    /// finished in time.
    #[error("{context}: no result within {timeout:?}")]
    DeadlineExceeded {
        context: JobContext,
        timeout: Duration,
    },

    /// Every allowed submission produced a rejected result.
    #[error("{context}: retries exhausted: {source}")]
    RetriesExhausted {
        context: JobContext,
        source: ValidationError,
    },

    /// The budget ran out after at least one rejected result; carries the
    /// most recent rejection.
    #[error("{context}: {source}")]
    Validation {
        context: JobContext,
        source: ValidationError,
    },

    #[error("{context}: {source}")]
    Transport {
        context: JobContext,
        source: TransportError,
    },
}

impl OrchestrationError {
    pub fn context(&self) -> &JobContext {
        match self {
            OrchestrationError::DeadlineExceeded { context, .. }
            | OrchestrationError::RetriesExhausted { context, .. }
            | OrchestrationError::Validation { context, .. }
            | OrchestrationError::Transport { context, .. } => context,
        }
    }

    /// The rejection that ended the run, if a validator caused it.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            OrchestrationError::RetriesExhausted { source, .. }
            | OrchestrationError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            OrchestrationError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, OrchestrationError::DeadlineExceeded { .. })
    }
}
