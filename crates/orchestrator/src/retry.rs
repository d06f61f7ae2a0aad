//! Retry an operation that can fail transiently, waiting between attempts
//! according to a backoff strategy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use asyncjob_core::TransportError;

use crate::clock::Clock;

/// How the wait before the next attempt grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Every failed attempt waits `base_delay`.
    Fixed,
    /// Failed attempt `n` waits `base_delay * 2^(n-1)`.
    #[default]
    Exponential,
    /// Failed attempt `n` waits `base_delay * n`.
    Linear,
}

/// How many times a transiently failing call is attempted, and how long to
/// wait after each failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Attempt once and surface the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `max_attempts` attempts, waiting `delay` after each failure.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// `max_attempts` attempts, doubling the wait from `base_delay` up to `max_delay`.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        };

        delay.min(self.max_delay)
    }

    /// Whether a call that has failed `attempt` times may be attempted again.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Failure reported by one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryableError<E> {
    /// Worth another attempt.
    Transient(E),
    /// Stop immediately.
    Permanent(E),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{0}")]
    Permanent(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Permanent(e) => e,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out.
///
/// `op` receives the 1-indexed attempt number.
pub fn retry_with_backoff<C, T, E, F>(
    clock: &C,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    C: Clock + ?Sized,
    E: core::fmt::Display,
    F: FnMut(u32) -> Result<T, RetryableError<E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(RetryableError::Permanent(e)) => return Err(RetryError::Permanent(e)),
            Err(RetryableError::Transient(e)) => {
                if !policy.should_retry(attempt) {
                    warn!(attempt, error = %e, "transient failure; attempts exhausted");
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure; retrying"
                );
                clock.sleep(delay);
            }
        }
    }
}

/// Retry a remote call while the service reports itself unavailable.
///
/// Every other transport error is returned on first occurrence.
pub fn retry_transport<C, T, F>(
    clock: &C,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, TransportError>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<T, TransportError>,
{
    retry_with_backoff(clock, policy, |_| {
        op().map_err(|e| {
            if e.is_service_unavailable() {
                RetryableError::Transient(e)
            } else {
                RetryableError::Permanent(e)
            }
        })
    })
    .map_err(RetryError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn exponential_wait_doubles_per_failed_attempt() {
        let policy = RetryPolicy::exponential(5, ms(100), Duration::from_secs(10));

        assert_eq!(policy.delay_for_attempt(1), ms(100));
        assert_eq!(policy.delay_for_attempt(2), ms(200));
        assert_eq!(policy.delay_for_attempt(3), ms(400));
        assert_eq!(policy.delay_for_attempt(4), ms(800));
    }

    #[test]
    fn exponential_wait_stops_at_max_delay() {
        let policy = RetryPolicy::exponential(50, ms(100), ms(1_000));

        assert_eq!(policy.delay_for_attempt(5), ms(1_000));
        assert_eq!(policy.delay_for_attempt(40), ms(1_000));
    }

    #[test]
    fn fixed_wait_ignores_attempt_number() {
        let policy = RetryPolicy::fixed(3, ms(500));

        assert_eq!(policy.delay_for_attempt(1), ms(500));
        assert_eq!(policy.delay_for_attempt(3), ms(500));
    }

    #[test]
    fn linear_wait_scales_with_attempt_number() {
        let policy = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            base_delay: ms(100),
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(1), ms(100));
        assert_eq!(policy.delay_for_attempt(3), ms(300));
    }

    #[test]
    fn transient_failures_retry_until_success() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::exponential(5, ms(1_000), Duration::from_secs(60));

        let value = retry_with_backoff(&clock, &policy, |attempt| {
            if attempt < 3 {
                Err(RetryableError::Transient("503"))
            } else {
                Ok(attempt)
            }
        })
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(clock.sleeps(), vec![ms(1_000), ms(2_000)]);
    }

    #[test]
    fn exhaustion_returns_last_error() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::fixed(3, ms(10));

        let err = retry_with_backoff::<_, (), _, _>(&clock, &policy, |attempt| {
            Err(RetryableError::Transient(format!("failure {attempt}")))
        })
        .unwrap_err();

        assert_eq!(
            err,
            RetryError::Exhausted {
                attempts: 3,
                last: "failure 3".to_string()
            }
        );
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn retry_transport_only_retries_unavailable() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::exponential(4, ms(100), ms(1_000));
        let mut calls = 0;

        let err = retry_transport::<_, (), _>(&clock, &policy, || {
            calls += 1;
            if calls == 1 {
                Err(TransportError::unavailable("maintenance"))
            } else {
                Err(TransportError::Unauthorized("bad key".into()))
            }
        })
        .unwrap_err();

        assert_eq!(calls, 2);
        assert_eq!(err, TransportError::Unauthorized("bad key".into()));
    }

    #[test]
    fn retry_transport_surfaces_unavailable_after_exhaustion() {
        let clock = ManualClock::new();
        let policy = RetryPolicy::fixed(2, ms(100));

        let err = retry_transport::<_, (), _>(&clock, &policy, || {
            Err(TransportError::unavailable("down"))
        })
        .unwrap_err();

        assert!(err.is_service_unavailable());
    }
}
