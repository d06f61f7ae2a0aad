//! The remote side of a fire-and-poll job.

use std::sync::Arc;

use asyncjob_core::{FetchError, JobHandle, JobKind, TransportError};

/// Submits asynchronous work and fetches its result.
///
/// Implemented by whatever remote-service client the caller already has. One
/// client may implement this for several request/response pairs.
pub trait JobTransport<Req, Resp>: Send + Sync {
    /// Start a job and return its token.
    fn submit(&self, kind: &JobKind, request: &Req) -> Result<JobHandle, TransportError>;

    /// Fetch the result of a submitted job.
    ///
    /// Must answer [`FetchError::NotReady`] or [`FetchError::TableUnavailable`]
    /// while the job is still running. `request` is the original request,
    /// passed back unchanged.
    fn fetch_result(
        &self,
        kind: &JobKind,
        handle: &JobHandle,
        request: &Req,
    ) -> Result<Resp, FetchError>;
}

impl<T, Req, Resp> JobTransport<Req, Resp> for &T
where
    T: JobTransport<Req, Resp> + ?Sized,
{
    fn submit(&self, kind: &JobKind, request: &Req) -> Result<JobHandle, TransportError> {
        (**self).submit(kind, request)
    }

    fn fetch_result(
        &self,
        kind: &JobKind,
        handle: &JobHandle,
        request: &Req,
    ) -> Result<Resp, FetchError> {
        (**self).fetch_result(kind, handle, request)
    }
}

impl<T, Req, Resp> JobTransport<Req, Resp> for Arc<T>
where
    T: JobTransport<Req, Resp> + ?Sized,
{
    fn submit(&self, kind: &JobKind, request: &Req) -> Result<JobHandle, TransportError> {
        (**self).submit(kind, request)
    }

    fn fetch_result(
        &self,
        kind: &JobKind,
        handle: &JobHandle,
        request: &Req,
    ) -> Result<Resp, FetchError> {
        (**self).fetch_result(kind, handle, request)
    }
}
