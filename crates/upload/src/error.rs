//! Upload error types.

/// Errors produced while preparing an upload.
///
/// The upload operations themselves never fail with an error: their
/// results are [`OperationOutcome`](crate::OperationOutcome) values.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}
