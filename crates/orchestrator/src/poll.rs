//! Plain condition polling: call a probe until it reports a value or time
//! runs out. No resubmission, no backoff.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use asyncjob_core::ValidationError;

use crate::clock::Clock;

/// Answer from one probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Ready(T),
    Pending,
}

impl<T> From<Option<T>> for Probe<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Probe::Ready(v),
            None => Probe::Pending,
        }
    }
}

#[derive(Debug, Error)]
pub enum WaitError<E> {
    #[error("condition not met within {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Probe(E),
}

/// Call `probe` every `interval` until it returns [`Probe::Ready`].
///
/// The probe always runs at least once. Fails with [`WaitError::TimedOut`]
/// once more than `max_wait` has elapsed; a probe error stops the wait.
pub fn wait_for<C, T, E, F>(
    clock: &C,
    max_wait: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, WaitError<E>>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<Probe<T>, E>,
{
    let start = clock.now();
    loop {
        if let Probe::Ready(value) = probe().map_err(WaitError::Probe)? {
            return Ok(value);
        }
        if clock.now().saturating_duration_since(start) > max_wait {
            return Err(WaitError::TimedOut(max_wait));
        }
        clock.sleep(interval);
    }
}

/// Poll `predicate` until it holds. Returns `false` on timeout.
pub fn wait_until<C, F>(clock: &C, max_wait: Duration, interval: Duration, mut predicate: F) -> bool
where
    C: Clock + ?Sized,
    F: FnMut() -> bool,
{
    wait_for::<_, _, core::convert::Infallible, _>(clock, max_wait, interval, || {
        Ok(if predicate() {
            Probe::Ready(())
        } else {
            Probe::Pending
        })
    })
    .is_ok()
}

/// Repeat `check` until it passes.
///
/// On timeout returns the last failure, prefixed with `label` and the time
/// waited, so the caller sees what the data actually looked like.
pub fn wait_for_valid<C, T, F>(
    clock: &C,
    max_wait: Duration,
    interval: Duration,
    label: &str,
    mut check: F,
) -> Result<T, ValidationError>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<T, ValidationError>,
{
    let mut last: Option<ValidationError> = None;
    let outcome = wait_for::<_, _, core::convert::Infallible, _>(clock, max_wait, interval, || {
        match check() {
            Ok(value) => Ok(Probe::Ready(value)),
            Err(e) => {
                debug!(label, error = %e, "condition not yet satisfied");
                last = Some(e);
                Ok(Probe::Pending)
            }
        }
    });

    match outcome {
        Ok(value) => Ok(value),
        Err(_) => Err(last
            .unwrap_or_else(|| ValidationError::new("condition never evaluated"))
            .context(format!("{label} (waited {max_wait:?})"))),
    }
}
