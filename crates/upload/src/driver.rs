//! Walks a sequence through create, photos, videos and finish.

use tracing::{info, warn};

use crate::orchestrator::UploadOrchestrator;
use crate::precondition::Precondition;
use crate::types::{MediaItem, Operation, OperationOutcome, SequenceStatus, SharedSequence};

/// How far [`SequenceUploader::upload`] got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The sequence is finished on the service.
    Finished,
    /// The gate closed; invoke again after resuming.
    Paused,
    /// A unit is missing required data.
    Blocked {
        operation: Operation,
        item_index: Option<usize>,
        reason: Precondition,
    },
    /// The access token was rejected.
    Rejected,
}

/// Sequential driver over an [`UploadOrchestrator`].
///
/// Units already done are not sent again, so a paused upload continues
/// where it stopped.
pub struct SequenceUploader<'a> {
    orchestrator: &'a UploadOrchestrator,
}

impl<'a> SequenceUploader<'a> {
    pub fn new(orchestrator: &'a UploadOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Uploads one sequence.
    pub async fn upload(&self, sequence: &SharedSequence, sequence_index: usize) -> DriveOutcome {
        let (created, photos, videos) = {
            let seq = sequence.lock().await;
            (seq.is_created(), seq.photos.len(), seq.videos.len())
        };

        if !created {
            let outcome = self
                .orchestrator
                .request_new_sequence(sequence, sequence_index)
                .await;
            if let Some(stop) = stop_on(outcome, Operation::CreateSequence, None) {
                return stop;
            }
        }

        for index in 0..photos {
            if sequence.lock().await.photos.get(index).is_none_or(MediaItem::is_done) {
                continue;
            }
            let outcome = self
                .orchestrator
                .request_new_photo(sequence, sequence_index, index)
                .await;
            if let Some(stop) = stop_on(outcome, Operation::UploadPhoto, Some(index)) {
                return stop;
            }
        }

        for index in 0..videos {
            if sequence.lock().await.videos.get(index).is_none_or(MediaItem::is_done) {
                continue;
            }
            let outcome = self
                .orchestrator
                .request_new_video(sequence, sequence_index, index)
                .await;
            if let Some(stop) = stop_on(outcome, Operation::UploadVideo, Some(index)) {
                return stop;
            }
        }

        if sequence.lock().await.status == SequenceStatus::Success {
            return DriveOutcome::Finished;
        }
        let outcome = self
            .orchestrator
            .request_sequence_finished(sequence, sequence_index)
            .await;
        stop_on(outcome, Operation::FinishSequence, None).unwrap_or(DriveOutcome::Finished)
    }

    /// Uploads sequences in order, stopping at the first pause.
    ///
    /// Returns one outcome per sequence attempted.
    pub async fn upload_all(&self, sequences: &[SharedSequence]) -> Vec<DriveOutcome> {
        let mut outcomes = Vec::with_capacity(sequences.len());
        for (index, sequence) in sequences.iter().enumerate() {
            let outcome = self.upload(sequence, index).await;
            match outcome {
                DriveOutcome::Finished => info!(sequence_index = index, "sequence uploaded"),
                DriveOutcome::Paused => info!(sequence_index = index, "upload paused"),
                DriveOutcome::Blocked {
                    operation,
                    item_index,
                    reason,
                } => warn!(sequence_index = index, %operation, ?item_index, %reason, "sequence blocked"),
                DriveOutcome::Rejected => warn!(sequence_index = index, "sequence rejected"),
            }
            outcomes.push(outcome);
            if outcome == DriveOutcome::Paused {
                break;
            }
        }
        outcomes
    }
}

/// Maps an operation outcome to a reason to stop driving, if any.
fn stop_on(
    outcome: OperationOutcome,
    operation: Operation,
    item_index: Option<usize>,
) -> Option<DriveOutcome> {
    match outcome {
        OperationOutcome::Completed | OperationOutcome::Redundant => None,
        OperationOutcome::Skipped => Some(DriveOutcome::Paused),
        OperationOutcome::Blocked(reason) => Some(DriveOutcome::Blocked {
            operation,
            item_index,
            reason,
        }),
        OperationOutcome::Rejected => Some(DriveOutcome::Rejected),
    }
}
