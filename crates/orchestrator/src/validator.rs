//! Caller-supplied acceptance checks over fetched results.

use asyncjob_core::ValidationError;

/// Accepts or rejects a completed job's result.
///
/// A rejection means "the platform answered, but not with what we expect
/// yet" and makes the orchestrator resubmit the whole job.
pub trait Validator<R> {
    fn validate(&self, result: &R) -> Result<(), ValidationError>;
}

impl<R, F> Validator<R> for F
where
    F: Fn(&R) -> Result<(), ValidationError>,
{
    fn validate(&self, result: &R) -> Result<(), ValidationError> {
        self(result)
    }
}

/// Validator that accepts every result.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAny;

impl<R> Validator<R> for AcceptAny {
    fn validate(&self, _result: &R) -> Result<(), ValidationError> {
        Ok(())
    }
}

pub fn accept_any() -> AcceptAny {
    AcceptAny
}

/// Fail with a mismatch error unless `expected == actual`.
pub fn ensure_eq<T>(what: &str, expected: T, actual: T) -> Result<(), ValidationError>
where
    T: PartialEq + core::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        Err(ValidationError::mismatch(what, expected, actual))
    }
}

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), ValidationError> {
    if condition {
        Ok(())
    } else {
        Err(ValidationError::new(message))
    }
}
