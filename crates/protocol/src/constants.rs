use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Production service root.
pub const DEFAULT_BASE_URL: &str = "https://openstreetcam.org";

/// API version segment inserted between the base URL and the command path.
pub const DEFAULT_API_VERSION: &str = "1.0";

/// Value sent in the `uploadSource` field when creating a sequence.
pub const DEFAULT_UPLOAD_SOURCE: &str = "osvup";

/// Fixed wait between a failed attempt and the next one.
///
/// There is no backoff: every retry waits exactly this long.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Form field names used by the upload commands.
pub mod field {
    pub const PLATFORM_NAME: &str = "platformName";
    pub const PLATFORM_VERSION: &str = "platformVersion";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const CURRENT_COORDINATE: &str = "currentCoordinate";
    pub const UPLOAD_SOURCE: &str = "uploadSource";
    pub const SEQUENCE_ID: &str = "sequenceId";
    pub const SEQUENCE_INDEX: &str = "sequenceIndex";
    pub const COORDINATE: &str = "coordinate";
}

/// Multipart part names and content types of the binary attachments.
pub mod part {
    pub const METADATA: &str = "metaData";
    pub const METADATA_CONTENT_TYPE: &str = "application/x-gzip";
    pub const PHOTO: &str = "photo";
    pub const PHOTO_CONTENT_TYPE: &str = "image/jpeg";
    pub const VIDEO: &str = "video";
    pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
}

/// Upload API command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Creates a sequence and returns its identity.
    NewSequence,
    /// Marks every unit of a sequence as received.
    SequenceFinished,
    /// Uploads one photo of a sequence.
    Photo,
    /// Uploads one video of a sequence.
    Video,
}

impl Command {
    /// Path of the command relative to the versioned API root.
    pub fn path(self) -> &'static str {
        match self {
            Command::NewSequence => "sequence/",
            Command::SequenceFinished => "sequence/finished-uploading/",
            Command::Photo => "photo/",
            Command::Video => "video/",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::NewSequence => "new sequence",
            Command::SequenceFinished => "sequence finished",
            Command::Photo => "photo",
            Command::Video => "video",
        };
        f.write_str(name)
    }
}

/// Resolves command URLs against a service root and API version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base_url: String,
    version: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_API_VERSION)
    }
}

impl ApiEndpoints {
    pub fn new(base_url: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            version: version.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a command, e.g. `https://host/1.0/photo/`.
    ///
    /// An empty version omits the version segment.
    pub fn url(&self, command: Command) -> String {
        let base = self.base_url.trim_end_matches('/');
        let version = self.version.trim_matches('/');
        if version.is_empty() {
            format!("{base}/{}", command.path())
        } else {
            format!("{base}/{version}/{}", command.path())
        }
    }
}

/// Formats a coordinate pair the way the service expects (`"lat,lng"`).
pub fn format_coordinate(lat: f64, lng: f64) -> String {
    format!("{lat},{lng}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_point_at_production() {
        let endpoints = ApiEndpoints::default();
        assert_eq!(
            endpoints.url(Command::NewSequence),
            "https://openstreetcam.org/1.0/sequence/"
        );
        assert_eq!(
            endpoints.url(Command::SequenceFinished),
            "https://openstreetcam.org/1.0/sequence/finished-uploading/"
        );
    }

    #[test]
    fn url_tolerates_extra_slashes() {
        let endpoints = ApiEndpoints::new("http://127.0.0.1:8080/", "/1.0/");
        assert_eq!(endpoints.url(Command::Photo), "http://127.0.0.1:8080/1.0/photo/");
    }

    #[test]
    fn url_without_version() {
        let endpoints = ApiEndpoints::new("http://localhost", "");
        assert_eq!(endpoints.url(Command::Video), "http://localhost/video/");
    }

    #[test]
    fn coordinate_format() {
        assert_eq!(format_coordinate(45.0, 25.0), "45,25");
        assert_eq!(format_coordinate(46.7712, -23.6236), "46.7712,-23.6236");
    }

    #[test]
    fn command_serde_names() {
        let json = serde_json::to_string(&Command::SequenceFinished).unwrap();
        assert_eq!(json, "\"sequence_finished\"");
    }
}
