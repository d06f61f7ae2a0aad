//! Orchestration policy: timeout budget, retry limit, poll cadence, backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_TIMEOUT_MS: &str = "ASYNCJOB_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "ASYNCJOB_MAX_RETRIES";
pub const ENV_POLL_INTERVAL_MS: &str = "ASYNCJOB_POLL_INTERVAL_MS";
pub const ENV_BACKOFF_FACTOR: &str = "ASYNCJOB_BACKOFF_FACTOR";

/// How many whole-job submissions a single run may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryLimit {
    /// At most `n` submissions. `Bounded(0)` still submits once.
    Bounded(u32),
    /// Only the timeout bounds the number of submissions.
    Unbounded,
}

impl RetryLimit {
    /// Whether another submission is allowed after `tries` submissions.
    pub fn allows_another(&self, tries: u32) -> bool {
        match self {
            RetryLimit::Bounded(max) => tries < *max,
            RetryLimit::Unbounded => true,
        }
    }
}

impl Default for RetryLimit {
    fn default() -> Self {
        Self::Bounded(1)
    }
}

impl core::fmt::Display for RetryLimit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RetryLimit::Bounded(n) => write!(f, "{n}"),
            RetryLimit::Unbounded => f.write_str("unlimited"),
        }
    }
}

impl core::str::FromStr for RetryLimit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") || s == "-1" {
            return Ok(RetryLimit::Unbounded);
        }
        s.parse::<u32>()
            .map(RetryLimit::Bounded)
            .map_err(|e| ConfigError::invalid(ENV_MAX_RETRIES, format!("{s}: {e}")))
    }
}

/// Policy for one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPolicy {
    /// Total wall-clock budget, measured from entry.
    pub timeout: Duration,
    /// Whole-job submission limit.
    pub max_retries: RetryLimit,
    /// Base wait between a submission and each status check.
    pub poll_interval: Duration,
    /// Multiplier applied to the wait after every rejected result.
    pub backoff_factor: f64,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: RetryLimit::default(),
            poll_interval: Duration::from_secs(1),
            backoff_factor: 1.2,
        }
    }
}

impl JobPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: RetryLimit) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Reject policies that would never terminate or would shrink the interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::invalid(
                "poll_interval",
                "must be greater than zero",
            ));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(ConfigError::invalid(
                "backoff_factor",
                format!("must be a finite number >= 1.0, got {}", self.backoff_factor),
            ));
        }
        Ok(())
    }

    /// Load a policy from `ASYNCJOB_*` environment variables.
    ///
    /// Unset variables fall back to [`JobPolicy::default`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`JobPolicy::from_env`] with a caller-supplied key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut policy = Self::default();

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            policy.timeout = parse_millis(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            policy.max_retries = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            policy.poll_interval = parse_millis(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BACKOFF_FACTOR) {
            policy.backoff_factor = raw
                .trim()
                .parse::<f64>()
                .map_err(|e| ConfigError::invalid(ENV_BACKOFF_FACTOR, format!("{raw}: {e}")))?;
        }

        policy.validate()?;
        Ok(policy)
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::invalid(key, format!("{raw}: {e}")))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
