//! Sequence upload flow.
//!
//! This crate implements the **business logic** for pushing a recorded
//! sequence to the service. It has no UI and no concrete network
//! dependency: the caller hands in a [`Transport`](osvup_transfer::Transport)
//! and a [`PauseGate`](osvup_transfer::PauseGate).
//!
//! # Pipeline
//!
//! 1. **Create**: register the sequence and receive its id
//! 2. **Photos**: upload every photo by index
//! 3. **Videos**: upload every video by index
//! 4. **Finish**: tell the service the sequence is complete
//!
//! Each step is one [`UploadOrchestrator`] operation that retries after a
//! fixed delay until it succeeds, the token is rejected, or the upload is
//! paused. [`SequenceUploader`] walks the steps in order.

pub mod driver;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod precondition;
pub mod types;

// Re-export primary types for convenience.
pub use driver::{DriveOutcome, SequenceUploader};
pub use error::UploadError;
pub use manifest::{ManifestItem, SequenceManifest, load_sequence};
pub use orchestrator::UploadOrchestrator;
pub use precondition::Precondition;
pub use types::{
    FileStatus, MediaItem, Metadata, Operation, OperationOutcome, Photo, RetryNotice, Sequence,
    SequenceStatus, SharedSequence, UploadActivity, UploadConfig, UploadEvent, Video,
};
