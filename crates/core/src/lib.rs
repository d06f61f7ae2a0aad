//! `asyncjob-core`: primitives shared by the job orchestrator and its callers.
//!
//! This crate contains **no I/O**: job identifiers, the job catalog, and the
//! closed error taxonomy that transports and validators report through.

pub mod error;
pub mod handle;
pub mod kind;

pub use error::{FetchError, TransportError, ValidationError};
pub use handle::JobHandle;
pub use kind::JobKind;
