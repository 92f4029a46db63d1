//! TOML description of a recorded sequence.
//!
//! ```toml
//! token = "..."
//! lat = 45.0
//! lng = 25.0
//!
//! [metadata]
//! path = "track.txt.gz"
//! platform_name = "linux"
//! platform_version = "6.1"
//!
//! [[photos]]
//! path = "0.jpg"
//! lat = 45.0001
//! lng = 25.0001
//!
//! [[videos]]
//! path = "0.mp4"
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UploadError;
use crate::types::{MediaItem, Metadata, Sequence};

/// One photo or video entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub path: PathBuf,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

/// Parsed manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceManifest {
    /// May be left empty and supplied on the command line or in config.
    #[serde(default)]
    pub token: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub photos: Vec<ManifestItem>,
    #[serde(default)]
    pub videos: Vec<ManifestItem>,
}

impl SequenceManifest {
    /// Parses and validates manifest text.
    pub fn parse(text: &str) -> Result<Self, UploadError> {
        let manifest: Self = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "manifest loaded");
        Self::parse(&text)
    }

    fn validate(&self) -> Result<(), UploadError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(UploadError::InvalidManifest(
                "sequence coordinates must be finite".into(),
            ));
        }
        if let Some(path) = &self.metadata.path
            && path.as_os_str().is_empty()
        {
            return Err(UploadError::InvalidManifest("empty metadata path".into()));
        }

        let entries = self
            .photos
            .iter()
            .map(|item| ("photo", item))
            .chain(self.videos.iter().map(|item| ("video", item)));
        for (kind, item) in entries {
            if item.path.as_os_str().is_empty() {
                return Err(UploadError::InvalidManifest(format!("{kind} with empty path")));
            }
            if !item.lat.is_finite() || !item.lng.is_finite() {
                return Err(UploadError::InvalidManifest(format!(
                    "{kind} {} has non-finite coordinates",
                    item.path.display()
                )));
            }
        }
        Ok(())
    }

    /// Builds a fresh, not yet created sequence.
    pub fn into_sequence(self, base_dir: &Path) -> Sequence {
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };

        let mut sequence = Sequence::new(self.lat, self.lng, self.token);
        sequence.metadata = Metadata {
            path: self.metadata.path.map(resolve),
            ..self.metadata
        };
        sequence.photos = self
            .photos
            .into_iter()
            .map(|item| MediaItem::new(resolve(item.path), item.lat, item.lng))
            .collect();
        sequence.videos = self
            .videos
            .into_iter()
            .map(|item| MediaItem::new(resolve(item.path), item.lat, item.lng))
            .collect();
        sequence
    }
}

/// Loads the manifest at `path` and turns it into a [`Sequence`].
pub fn load_sequence(path: &Path) -> Result<Sequence, UploadError> {
    let manifest = SequenceManifest::load(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(manifest.into_sequence(base_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SequenceStatus;

    const MANIFEST: &str = r#"
token = "t1"
lat = 45.0
lng = 25.0

[metadata]
path = "track.txt.gz"
platform_name = "linux"
platform_version = "6.1"

[[photos]]
path = "0.jpg"
lat = 45.1
lng = 25.1

[[photos]]
path = "/abs/1.jpg"
lat = 45.2
lng = 25.2

[[videos]]
path = "0.mp4"
"#;

    #[test]
    fn parses_full_manifest() {
        let manifest = SequenceManifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.token, "t1");
        assert_eq!(manifest.photos.len(), 2);
        assert_eq!(manifest.videos[0].lat, 0.0);
        assert_eq!(manifest.metadata.platform_version, "6.1");
    }

    #[test]
    fn minimal_manifest() {
        let manifest = SequenceManifest::parse("lat = 1.0\nlng = 2.0\n").unwrap();
        assert!(manifest.token.is_empty());
        assert!(manifest.photos.is_empty());
        assert_eq!(manifest.metadata, Metadata::default());
    }

    #[test]
    fn missing_coordinates_is_error() {
        let err = SequenceManifest::parse("token = \"t\"\n").unwrap_err();
        assert!(matches!(err, UploadError::Manifest(_)));
    }

    #[test]
    fn rejects_empty_item_path() {
        let err = SequenceManifest::parse("lat = 1.0\nlng = 2.0\n[[photos]]\npath = \"\"\n")
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidManifest(_)));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let err = SequenceManifest::parse("lat = nan\nlng = 2.0\n").unwrap_err();
        assert!(matches!(err, UploadError::InvalidManifest(_)));

        let text = "lat = 1.0\nlng = 2.0\n[[photos]]\npath = \"0.jpg\"\nlat = inf\n";
        let err = SequenceManifest::parse(text).unwrap_err();
        assert!(err.to_string().contains("0.jpg"));
    }

    #[test]
    fn into_sequence_resolves_paths() {
        let manifest = SequenceManifest::parse(MANIFEST).unwrap();
        let seq = manifest.into_sequence(Path::new("/data/seq1"));

        assert_eq!(seq.sequence_id, Sequence::UNSET_ID);
        assert_eq!(seq.status, SequenceStatus::New);
        assert_eq!(seq.token, "t1");
        assert_eq!(
            seq.metadata.path.as_deref(),
            Some(Path::new("/data/seq1/track.txt.gz"))
        );
        assert_eq!(seq.metadata.platform_name, "linux");
        assert_eq!(seq.photos[0].path, Path::new("/data/seq1/0.jpg"));
        assert_eq!(seq.photos[1].path, Path::new("/abs/1.jpg"));
        assert_eq!(seq.photos[1].lat, 45.2);
        assert_eq!(seq.videos[0].path, Path::new("/data/seq1/0.mp4"));
    }

    #[test]
    fn load_sequence_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequence.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let seq = load_sequence(&path).unwrap();
        assert_eq!(seq.photos[0].path, dir.path().join("0.jpg"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_sequence(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
