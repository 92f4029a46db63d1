//! Transport seam between the dispatcher and the network.

use std::future::Future;
use std::pin::Pin;

use crate::TransferError;
use crate::progress::ProgressReporter;
use crate::request::UploadRequest;

/// Raw reply to a request. The HTTP status is informational only; the
/// application code inside `body` decides the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub http_status: u16,
    pub body: String,
}

impl Reply {
    pub fn new(http_status: u16, body: impl Into<String>) -> Self {
        Self {
            http_status,
            body: body.into(),
        }
    }
}

/// Future returned by [`Transport::post`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Reply, TransferError>> + Send + 'a>>;

/// Abstract HTTP transport.
///
/// [`HttpTransport`](crate::HttpTransport) is the production
/// implementation; tests substitute recording mocks.
pub trait Transport: Send + Sync {
    /// Sends one POST and waits for the reply.
    ///
    /// `progress` is advanced as the body is written. An `Err` means no
    /// reply was received.
    fn post(&self, request: UploadRequest, progress: ProgressReporter) -> TransportFuture<'_>;
}
