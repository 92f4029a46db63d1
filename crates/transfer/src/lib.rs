//! Single-request dispatch for the upload API.
//!
//! A [`RequestDispatcher`] issues exactly one POST per call through a
//! [`Transport`], reports byte progress while the body streams out, and
//! honours the shared [`PauseGate`]: nothing is sent while paused, and a
//! reply that arrives after the gate closed is discarded.

mod attachment;
mod dispatcher;
mod http;
mod pause;
mod progress;
mod request;
mod transport;

pub use attachment::read_attachment;
pub use dispatcher::{DispatchOutcome, RequestDispatcher};
pub use http::HttpTransport;
pub use pause::PauseGate;
pub use progress::{ProgressCallback, ProgressReporter, SpeedCalculator};
pub use request::{Attachment, RequestBody, UploadRequest};
pub use transport::{Reply, Transport, TransportFuture};

/// Size of the slices an attachment is streamed in: 64 KiB.
///
/// Progress is reported once per slice.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
