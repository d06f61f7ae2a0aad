//! Failure model for submitting, fetching, and checking asynchronous jobs.

use thiserror::Error;

/// A fault reported by the remote service while submitting or fetching a job.
///
/// Always fatal from the orchestrator's point of view; a client that wants to
/// retry these does so below the orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The service answered 503 or the connection timed out.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Map an HTTP status code onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            503 => Self::ServiceUnavailable(message),
            _ => Self::Remote { status, message },
        }
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

/// Outcome of asking the transport for a job's result when it has none.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The job exists but is still processing.
    #[error("job result not ready{}", progress_suffix(.progress))]
    NotReady { progress: Option<String> },

    /// A table backing the job is still being built.
    #[error("table unavailable: {0}")]
    TableUnavailable(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

fn progress_suffix(progress: &Option<String>) -> String {
    progress
        .as_deref()
        .map(|p| format!(": {p}"))
        .unwrap_or_default()
}

impl FetchError {
    pub fn not_ready() -> Self {
        Self::NotReady { progress: None }
    }

    pub fn not_ready_with(progress: impl Into<String>) -> Self {
        Self::NotReady {
            progress: Some(progress.into()),
        }
    }

    pub fn table_unavailable(msg: impl Into<String>) -> Self {
        Self::TableUnavailable(msg.into())
    }

    /// "Try again later" conditions. Both variants are handled identically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady { .. } | Self::TableUnavailable(_))
    }
}

/// A completed job produced a result the caller does not accept (yet).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    expected: Option<String>,
    actual: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Build a failure describing an expected/actual mismatch.
    pub fn mismatch(
        what: impl core::fmt::Display,
        expected: impl core::fmt::Debug,
        actual: impl core::fmt::Debug,
    ) -> Self {
        let expected = format!("{expected:?}");
        let actual = format!("{actual:?}");
        Self {
            message: format!("{what}: expected {expected}, got {actual}"),
            expected: Some(expected),
            actual: Some(actual),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn actual(&self) -> Option<&str> {
        self.actual.as_deref()
    }

    /// Prefix the message with extra context, keeping expected/actual.
    pub fn context(mut self, context: impl core::fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}
