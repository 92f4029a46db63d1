//! Data types for the upload flow.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use osvup_protocol::constants::{DEFAULT_RETRY_DELAY, DEFAULT_UPLOAD_SOURCE};
use osvup_protocol::{ApiEndpoints, Command, RemoteSequence};
use serde::{Deserialize, Serialize};

use crate::precondition::Precondition;

/// Lifecycle of a sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceStatus {
    #[default]
    New,
    /// Creation request outstanding, or created and uploading units.
    Busy,
    /// Finished on the service side.
    Success,
    /// Last creation attempt failed.
    Failed,
    /// Last finish attempt failed.
    FailedFinish,
}

/// Lifecycle of a single photo or video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    #[default]
    New,
    Busy,
    /// Received by the service. Terminal.
    Done,
    Failed,
}

/// A photo or video belonging to a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: PathBuf,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
    #[serde(default)]
    status: FileStatus,
}

pub type Photo = MediaItem;
pub type Video = MediaItem;

impl MediaItem {
    pub fn new(path: impl Into<PathBuf>, lat: f64, lng: f64) -> Self {
        Self {
            path: path.into(),
            lat,
            lng,
            status: FileStatus::New,
        }
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// Updates the status. An item that is [`FileStatus::Done`] stays done.
    pub fn set_status(&mut self, status: FileStatus) {
        if self.status != FileStatus::Done {
            self.status = status;
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == FileStatus::Done
    }
}

/// The sequence's metadata blob and the platform it was recorded on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Gzipped track file. `None` sends no metadata part.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub platform_name: String,
    #[serde(default)]
    pub platform_version: String,
}

/// One upload unit: metadata plus ordered photos and videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Service-assigned id; [`Sequence::UNSET_ID`] until created.
    pub sequence_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub token: String,
    pub metadata: Metadata,
    pub photos: Vec<Photo>,
    pub videos: Vec<Video>,
    pub status: SequenceStatus,
    /// Record returned by the service at creation.
    pub remote: Option<RemoteSequence>,
}

/// A sequence shared between the driver and the orchestrator.
pub type SharedSequence = Arc<tokio::sync::Mutex<Sequence>>;

impl Sequence {
    pub const UNSET_ID: i64 = -1;

    pub fn new(lat: f64, lng: f64, token: impl Into<String>) -> Self {
        Self {
            sequence_id: Self::UNSET_ID,
            lat,
            lng,
            token: token.into(),
            metadata: Metadata::default(),
            photos: Vec::new(),
            videos: Vec::new(),
            status: SequenceStatus::New,
            remote: None,
        }
    }

    /// Whether the service has assigned an id.
    pub fn is_created(&self) -> bool {
        self.sequence_id >= 0
    }

    pub fn into_shared(self) -> SharedSequence {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Number of photos and videos already received.
    pub fn done_count(&self) -> usize {
        self.photos
            .iter()
            .chain(self.videos.iter())
            .filter(|item| item.is_done())
            .count()
    }
}

/// The four upload operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateSequence,
    FinishSequence,
    UploadPhoto,
    UploadVideo,
}

impl Operation {
    pub fn command(self) -> Command {
        match self {
            Operation::CreateSequence => Command::NewSequence,
            Operation::FinishSequence => Command::SequenceFinished,
            Operation::UploadPhoto => Command::Photo,
            Operation::UploadVideo => Command::Video,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::CreateSequence => "create sequence",
            Operation::FinishSequence => "finish sequence",
            Operation::UploadPhoto => "upload photo",
            Operation::UploadVideo => "upload video",
        };
        f.write_str(name)
    }
}

/// Terminal event emitted by the orchestrator, at most one per operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// The service assigned an id to the sequence.
    SequenceCreated { sequence_index: usize },
    /// The service accepted the finish request.
    SequenceFinished { sequence_index: usize },
    /// A photo was received (freshly or as a duplicate).
    PhotoUploaded {
        sequence_index: usize,
        photo_index: usize,
    },
    /// A video was received (freshly or as a duplicate).
    VideoUploaded {
        sequence_index: usize,
        video_index: usize,
    },
    /// The access token was rejected. No retry follows.
    ErrorFound { sequence_index: usize },
}

/// A failed attempt waiting to run again.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    pub operation: Operation,
    pub sequence_index: usize,
    pub item_index: Option<usize>,
    /// 1-based number of the attempt that failed.
    pub attempt: u32,
    pub delay: Duration,
}

/// Latest state of the transfer, published on a watch channel.
///
/// Only the newest value is kept, so a slow reader never holds up an
/// upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadActivity {
    /// Cumulative bytes sent by the current attempt. Restarts at zero with
    /// every request.
    pub bytes_sent: u64,
    /// Most recent failed attempt.
    pub retry: Option<RetryNotice>,
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The unit was accepted (or was a duplicate) and its event was emitted.
    Completed,
    /// Paused, or the item index was out of range. Nothing was sent.
    Skipped,
    /// Required data was missing. Nothing was sent.
    Blocked(Precondition),
    /// The access token was rejected.
    Rejected,
    /// The sequence was already finished; the reply was ignored.
    Redundant,
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub endpoints: ApiEndpoints,
    /// Fixed wait between a failed attempt and the next.
    pub retry_delay: Duration,
    /// Sent as `uploadSource` when creating a sequence.
    pub upload_source: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoints: ApiEndpoints::default(),
            retry_delay: DEFAULT_RETRY_DELAY,
            upload_source: DEFAULT_UPLOAD_SOURCE.to_string(),
        }
    }
}
