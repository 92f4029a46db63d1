//! Reading attachment files from disk.

use std::path::Path;

use tracing::warn;

use crate::request::Attachment;

/// Reads a whole file into memory.
///
/// A missing or unreadable file yields an empty buffer; callers treat an
/// empty buffer as "no data" and refuse to send the request.
pub async fn read_attachment(path: &Path) -> Vec<u8> {
    match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read attachment");
            Vec::new()
        }
    }
}

/// Final path component, used as the multipart file name.
fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Attachment {
    /// Builds an attachment from a file on disk.
    ///
    /// The file handle is closed before this returns; `data` is empty when
    /// the file cannot be read.
    pub async fn load(part_name: &str, content_type: &str, path: &Path) -> Self {
        Self {
            part_name: part_name.to_string(),
            file_name: file_name_of(path),
            content_type: content_type.to_string(),
            data: read_attachment(path).await,
        }
    }
}
