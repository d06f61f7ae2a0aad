//! `asyncjob-orchestrator`
//!
//! Client-side orchestration of fire-and-poll jobs: submit a request, poll
//! the returned handle until a result exists, check the result, and resubmit
//! the whole job with backoff when the check fails.
//!
//! ## Components
//!
//! - `AsyncJobOrchestrator`: the retry/deadline state machine
//! - `JobTransport` / `Validator`: the two collaborators it drives
//! - `poll`, `retry`, `status`: simpler waiting helpers sharing the same
//!   `Clock`
//! - `Fixture`: explicit test context with ordered teardown
//! - `testing::ScriptedTransport`: in-memory transport

pub mod clock;
pub mod config;
pub mod error;
pub mod fixture;
pub mod orchestrator;
pub mod poll;
pub mod retry;
pub mod status;
pub mod testing;
pub mod transport;
pub mod types;
pub mod validator;

pub use asyncjob_core::{FetchError, JobHandle, JobKind, TransportError, ValidationError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, JobPolicy, RetryLimit};
pub use error::{JobContext, OrchestrationError};
pub use fixture::{Fixture, TeardownError};
pub use orchestrator::AsyncJobOrchestrator;
pub use poll::{Probe, WaitError, wait_for, wait_for_valid, wait_until};
pub use retry::{BackoffStrategy, RetryError, RetryPolicy, RetryableError, retry_transport, retry_with_backoff};
pub use status::{JobState, JobStatusReport, StatusWaitError, wait_for_completion};
pub use transport::JobTransport;
pub use types::{AttemptOutcome, AttemptRecord, OrchestrationResult, RetryBudget};
pub use validator::{AcceptAny, Validator, accept_any, ensure, ensure_eq};
