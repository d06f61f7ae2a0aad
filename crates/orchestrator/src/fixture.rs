//! Explicit per-suite test context with deterministic teardown.
//!
//! Replaces shared static clients and "things to delete" lists: the fixture
//! owns the client, every created resource registers its own cleanup, and
//! teardown runs them newest first.

use thiserror::Error;
use tracing::{debug, warn};

type Cleanup<C> = Box<dyn FnOnce(&C) -> anyhow::Result<()> + Send>;

/// Owns a client/context value and the cleanups registered against it.
pub struct Fixture<C> {
    client: C,
    cleanups: Vec<(String, Cleanup<C>)>,
}

impl<C> Fixture<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            cleanups: Vec::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Register a cleanup; cleanups run in reverse registration order.
    pub fn defer<F>(&mut self, label: impl Into<String>, cleanup: F)
    where
        F: FnOnce(&C) -> anyhow::Result<()> + Send + 'static,
    {
        self.cleanups.push((label.into(), Box::new(cleanup)));
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }

    /// Run every registered cleanup, newest first.
    ///
    /// A failing cleanup does not stop the others; all failures are returned
    /// together.
    pub fn teardown(mut self) -> Result<(), TeardownError> {
        let failures = self.run_cleanups();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }

    fn run_cleanups(&mut self) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        while let Some((label, cleanup)) = self.cleanups.pop() {
            match cleanup(&self.client) {
                Ok(()) => debug!(cleanup = %label, "cleanup done"),
                Err(error) => failures.push(CleanupFailure { label, error }),
            }
        }
        failures
    }
}

impl<C> Drop for Fixture<C> {
    fn drop(&mut self) {
        if self.cleanups.is_empty() {
            return;
        }
        for failure in self.run_cleanups() {
            warn!(cleanup = %failure.label, error = %failure.error, "cleanup failed during drop");
        }
    }
}

impl<C: core::fmt::Debug> core::fmt::Debug for Fixture<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fixture")
            .field("client", &self.client)
            .field(
                "cleanups",
                &self.cleanups.iter().map(|(l, _)| l).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug)]
pub struct CleanupFailure {
    pub label: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Error)]
#[error("{}", summarize(.failures))]
pub struct TeardownError {
    pub failures: Vec<CleanupFailure>,
}

fn summarize(failures: &[CleanupFailure]) -> String {
    let details = failures
        .iter()
        .map(|f| format!("{}: {}", f.label, f.error))
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} cleanup action(s) failed: {details}", failures.len())
}
