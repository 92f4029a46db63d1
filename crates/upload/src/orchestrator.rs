//! Upload orchestrator for the four sequence operations.
//!
//! Every operation has the same shape: guard on the pause gate, check the
//! required data, dispatch one request, interpret the reply. A failed
//! attempt marks the entity failed, waits [`UploadConfig::retry_delay`] and
//! runs again with the same arguments. The loop ends on success, on a
//! rejected token, or when the gate is closed at the top of an attempt.
//!
//! Terminal events go to an unbounded queue, so emitting one never waits on
//! the reader. Byte progress and retry notices go to a watch channel that
//! only holds the latest [`UploadActivity`].

use std::future::Future;
use std::sync::Arc;

use osvup_protocol::constants::{field, format_coordinate, part};
use osvup_protocol::{ApiResponse, Command, StatusCode, interpret};
use osvup_transfer::{
    Attachment, DispatchOutcome, PauseGate, ProgressReporter, Reply, RequestDispatcher, Transport,
    UploadRequest,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::precondition::{
    check_new_sequence, check_photo, check_sequence_finished, check_video,
};
use crate::types::{
    FileStatus, MediaItem, Operation, OperationOutcome, RetryNotice, Sequence, SequenceStatus,
    SharedSequence, UploadActivity, UploadConfig, UploadEvent,
};

/// Result of a single attempt.
enum Attempt {
    /// The operation is over, successfully or not.
    Finished(OperationOutcome),
    /// Retry after the delay.
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    fn operation(self) -> Operation {
        match self {
            MediaKind::Photo => Operation::UploadPhoto,
            MediaKind::Video => Operation::UploadVideo,
        }
    }

    fn items(self, sequence: &Sequence) -> &[MediaItem] {
        match self {
            MediaKind::Photo => &sequence.photos,
            MediaKind::Video => &sequence.videos,
        }
    }

    fn items_mut(self, sequence: &mut Sequence) -> &mut [MediaItem] {
        match self {
            MediaKind::Photo => &mut sequence.photos,
            MediaKind::Video => &mut sequence.videos,
        }
    }

    /// Multipart part name and content type.
    fn part(self) -> (&'static str, &'static str) {
        match self {
            MediaKind::Photo => (part::PHOTO, part::PHOTO_CONTENT_TYPE),
            MediaKind::Video => (part::VIDEO, part::VIDEO_CONTENT_TYPE),
        }
    }

    fn uploaded(self, sequence_index: usize, item_index: usize) -> UploadEvent {
        match self {
            MediaKind::Photo => UploadEvent::PhotoUploaded {
                sequence_index,
                photo_index: item_index,
            },
            MediaKind::Video => UploadEvent::VideoUploaded {
                sequence_index,
                video_index: item_index,
            },
        }
    }
}

/// Drives sequence uploads against the service.
pub struct UploadOrchestrator {
    dispatcher: RequestDispatcher,
    config: UploadConfig,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<UploadEvent>>,
    activity: Arc<watch::Sender<UploadActivity>>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator sending through `transport` under `gate`.
    pub fn new(transport: Arc<dyn Transport>, gate: PauseGate, config: UploadConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (activity, _) = watch::channel(UploadActivity::default());
        Self {
            dispatcher: RequestDispatcher::new(transport, gate),
            config,
            events_tx,
            events_rx: Some(events_rx),
            activity: Arc::new(activity),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events may be read during or after an operation; none is dropped.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Subscribes to byte progress and retry notices.
    pub fn activity(&self) -> watch::Receiver<UploadActivity> {
        self.activity.subscribe()
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn gate(&self) -> &PauseGate {
        self.dispatcher.gate()
    }

    /// Closes the gate: no new request is issued and replies still in
    /// flight are discarded.
    pub fn pause_upload(&self) {
        self.gate().pause();
        info!("upload paused");
    }

    /// Opens the gate. Operations that stopped while paused are not
    /// restarted; the caller invokes them again.
    pub fn resume_upload(&self) {
        self.gate().resume();
        info!("upload resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.gate().is_paused()
    }

    /// Registers `sequence` with the service and stores the assigned id.
    ///
    /// Emits [`UploadEvent::SequenceCreated`] on success, or a single
    /// [`UploadEvent::ErrorFound`] when the token is rejected.
    pub async fn request_new_sequence(
        &self,
        sequence: &SharedSequence,
        sequence_index: usize,
    ) -> OperationOutcome {
        self.retrying(Operation::CreateSequence, sequence_index, None, move || {
            self.create_attempt(sequence, sequence_index)
        })
        .await
    }

    /// Marks `sequence` as complete on the service.
    ///
    /// Emits [`UploadEvent::SequenceFinished`] at most once per sequence.
    pub async fn request_sequence_finished(
        &self,
        sequence: &SharedSequence,
        sequence_index: usize,
    ) -> OperationOutcome {
        self.retrying(Operation::FinishSequence, sequence_index, None, move || {
            self.finish_attempt(sequence, sequence_index)
        })
        .await
    }

    /// Uploads the photo at `photo_index`.
    pub async fn request_new_photo(
        &self,
        sequence: &SharedSequence,
        sequence_index: usize,
        photo_index: usize,
    ) -> OperationOutcome {
        self.upload_media(MediaKind::Photo, sequence, sequence_index, photo_index)
            .await
    }

    /// Uploads the video at `video_index`.
    pub async fn request_new_video(
        &self,
        sequence: &SharedSequence,
        sequence_index: usize,
        video_index: usize,
    ) -> OperationOutcome {
        self.upload_media(MediaKind::Video, sequence, sequence_index, video_index)
            .await
    }

    async fn upload_media(
        &self,
        kind: MediaKind,
        sequence: &SharedSequence,
        sequence_index: usize,
        item_index: usize,
    ) -> OperationOutcome {
        self.retrying(kind.operation(), sequence_index, Some(item_index), move || {
            self.media_attempt(kind, sequence, sequence_index, item_index)
        })
        .await
    }

    /// Runs `attempt` until it finishes, sleeping between failures.
    async fn retrying<F, Fut>(
        &self,
        operation: Operation,
        sequence_index: usize,
        item_index: Option<usize>,
        mut attempt: F,
    ) -> OperationOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt>,
    {
        let mut attempts: u32 = 0;
        loop {
            if self.is_paused() {
                debug!(%operation, sequence_index, ?item_index, "upload paused, skipping");
                return OperationOutcome::Skipped;
            }

            attempts += 1;
            if let Attempt::Finished(outcome) = attempt().await {
                return outcome;
            }

            let delay = self.config.retry_delay;
            warn!(
                %operation,
                sequence_index,
                ?item_index,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "attempt failed, retrying"
            );
            let notice = RetryNotice {
                operation,
                sequence_index,
                item_index,
                attempt: attempts,
                delay,
            };
            self.activity.send_modify(|activity| activity.retry = Some(notice));
            tokio::time::sleep(delay).await;
        }
    }

    async fn create_attempt(&self, sequence: &SharedSequence, sequence_index: usize) -> Attempt {
        let metadata_path = sequence.lock().await.metadata.path.clone();
        let metadata = match &metadata_path {
            Some(path) => {
                Some(Attachment::load(part::METADATA, part::METADATA_CONTENT_TYPE, path).await)
            }
            None => None,
        }
        .filter(|metadata| !metadata.data.is_empty());

        let (request, previous) = {
            let mut seq = sequence.lock().await;
            let metadata_bytes = metadata.as_ref().map(|m| m.data.as_slice()).unwrap_or_default();
            if let Err(reason) = check_new_sequence(&seq, metadata_bytes) {
                warn!(sequence_index, %reason, "cannot create sequence");
                return Attempt::Finished(OperationOutcome::Blocked(reason));
            }

            let command = Command::NewSequence;
            let mut request = UploadRequest::multipart(command, self.config.endpoints.url(command))
                .field(field::PLATFORM_NAME, seq.metadata.platform_name.clone())
                .field(field::PLATFORM_VERSION, seq.metadata.platform_version.clone())
                .field(field::ACCESS_TOKEN, seq.token.clone())
                .field(field::CURRENT_COORDINATE, format_coordinate(seq.lat, seq.lng))
                .field(field::UPLOAD_SOURCE, self.config.upload_source.clone());
            if let Some(metadata) = metadata {
                request = request.attachment(metadata);
            }

            let previous = seq.status;
            seq.status = SequenceStatus::Busy;
            (request, previous)
        };

        let reply = match self.dispatcher.dispatch(request, self.progress()).await {
            DispatchOutcome::NotIssued => {
                sequence.lock().await.status = previous;
                return Attempt::Finished(OperationOutcome::Skipped);
            }
            DispatchOutcome::Completed(reply) => reply,
        };

        let (status, response) = read_reply(reply);

        let mut seq = sequence.lock().await;
        match status {
            StatusCode::Success => {
                let Some(remote) = response
                    .as_ref()
                    .and_then(ApiResponse::sequence)
                    .filter(|remote| remote.id >= 0)
                else {
                    warn!(sequence_index, "sequence created without a usable id");
                    seq.status = SequenceStatus::Failed;
                    return Attempt::Failed;
                };

                seq.sequence_id = remote.id;
                seq.remote = Some(remote);
                seq.status = SequenceStatus::Busy;
                info!(sequence_index, sequence_id = seq.sequence_id, "sequence created");
                drop(seq);

                self.emit(UploadEvent::SequenceCreated { sequence_index });
                Attempt::Finished(OperationOutcome::Completed)
            }
            StatusCode::BadLogin => {
                seq.status = SequenceStatus::Failed;
                drop(seq);
                error!(sequence_index, "access token rejected");

                self.emit(UploadEvent::ErrorFound { sequence_index });
                Attempt::Finished(OperationOutcome::Rejected)
            }
            other => {
                debug!(sequence_index, ?other, message = ?api_message(&response), "sequence not created");
                seq.status = SequenceStatus::Failed;
                Attempt::Failed
            }
        }
    }

    async fn finish_attempt(&self, sequence: &SharedSequence, sequence_index: usize) -> Attempt {
        let request = {
            let seq = sequence.lock().await;
            if let Err(reason) = check_sequence_finished(&seq) {
                debug!(sequence_index, %reason, "cannot finish sequence");
                return Attempt::Finished(OperationOutcome::Blocked(reason));
            }

            let command = Command::SequenceFinished;
            UploadRequest::form(command, self.config.endpoints.url(command))
                .field(field::SEQUENCE_ID, seq.sequence_id.to_string())
                .field(field::ACCESS_TOKEN, seq.token.clone())
        };

        let reply = match self.dispatcher.dispatch(request, self.progress()).await {
            DispatchOutcome::NotIssued => return Attempt::Finished(OperationOutcome::Skipped),
            DispatchOutcome::Completed(reply) => reply,
        };

        let (status, response) = read_reply(reply);

        let mut seq = sequence.lock().await;
        let already_finished = seq.status == SequenceStatus::Success;
        match status {
            StatusCode::Success if already_finished => {
                info!(sequence_index, "sequence already finished, reply ignored");
                Attempt::Finished(OperationOutcome::Redundant)
            }
            StatusCode::Success => {
                seq.status = SequenceStatus::Success;
                info!(sequence_index, sequence_id = seq.sequence_id, "sequence finished");
                drop(seq);

                self.emit(UploadEvent::SequenceFinished { sequence_index });
                Attempt::Finished(OperationOutcome::Completed)
            }
            other => {
                debug!(sequence_index, ?other, message = ?api_message(&response), "sequence not finished");
                if !already_finished {
                    seq.status = SequenceStatus::FailedFinish;
                }
                Attempt::Failed
            }
        }
    }

    async fn media_attempt(
        &self,
        kind: MediaKind,
        sequence: &SharedSequence,
        sequence_index: usize,
        item_index: usize,
    ) -> Attempt {
        let operation = kind.operation();
        let path = {
            let seq = sequence.lock().await;
            match kind.items(&seq).get(item_index) {
                Some(item) => item.path.clone(),
                None => {
                    debug!(%operation, sequence_index, item_index, "index out of range");
                    return Attempt::Finished(OperationOutcome::Skipped);
                }
            }
        };
        let (part_name, content_type) = kind.part();
        let attachment = Attachment::load(part_name, content_type, &path).await;

        let (request, previous) = {
            let mut seq = sequence.lock().await;
            let Some(item) = kind.items(&seq).get(item_index) else {
                return Attempt::Finished(OperationOutcome::Skipped);
            };
            let checked = match kind {
                MediaKind::Photo => check_photo(&seq, item, &attachment.data),
                MediaKind::Video => check_video(&seq, &attachment.data),
            };
            if let Err(reason) = checked {
                warn!(%operation, sequence_index, item_index, %reason, "cannot upload");
                return Attempt::Finished(OperationOutcome::Blocked(reason));
            }
            let (lat, lng) = (item.lat, item.lng);

            let command = operation.command();
            let mut request = UploadRequest::multipart(command, self.config.endpoints.url(command))
                .field(field::SEQUENCE_ID, seq.sequence_id.to_string())
                .field(field::SEQUENCE_INDEX, item_index.to_string());
            if let MediaKind::Photo = kind {
                request = request.field(field::COORDINATE, format_coordinate(lat, lng));
            }
            let request = request
                .field(field::ACCESS_TOKEN, seq.token.clone())
                .attachment(attachment);

            let item = &mut kind.items_mut(&mut seq)[item_index];
            let previous = item.status();
            item.set_status(FileStatus::Busy);
            (request, previous)
        };

        let reply = match self.dispatcher.dispatch(request, self.progress()).await {
            DispatchOutcome::NotIssued => {
                if let Some(item) = kind.items_mut(&mut *sequence.lock().await).get_mut(item_index) {
                    item.set_status(previous);
                }
                return Attempt::Finished(OperationOutcome::Skipped);
            }
            DispatchOutcome::Completed(reply) => reply,
        };

        let (status, response) = read_reply(reply);

        let mut seq = sequence.lock().await;
        let Some(item) = kind.items_mut(&mut seq).get_mut(item_index) else {
            return Attempt::Finished(OperationOutcome::Skipped);
        };
        match status {
            StatusCode::Success | StatusCode::Duplicate => {
                item.set_status(FileStatus::Done);
                drop(seq);
                if status == StatusCode::Duplicate {
                    info!(%operation, sequence_index, item_index, "already on the server");
                } else {
                    info!(%operation, sequence_index, item_index, "uploaded");
                }

                self.emit(kind.uploaded(sequence_index, item_index));
                Attempt::Finished(OperationOutcome::Completed)
            }
            other => {
                debug!(%operation, sequence_index, item_index, ?other, message = ?api_message(&response), "not uploaded");
                item.set_status(FileStatus::Failed);
                Attempt::Failed
            }
        }
    }

    /// Progress reporter publishing cumulative byte counts on the activity
    /// channel. The count restarts at zero for the new request.
    fn progress(&self) -> ProgressReporter {
        self.activity.send_modify(|activity| activity.bytes_sent = 0);
        let activity = Arc::clone(&self.activity);
        ProgressReporter::new(Arc::new(move |bytes_sent| {
            activity.send_modify(|activity| activity.bytes_sent = bytes_sent);
        }))
    }

    fn emit(&self, event: UploadEvent) {
        // The receiver lives in `self` until taken; a dropped one is ignored.
        let _ = self.events_tx.send(event);
    }
}

/// Classifies a reply. A transport failure is [`StatusCode::StatusIncorrect`].
fn read_reply(reply: Option<Reply>) -> (StatusCode, Option<ApiResponse>) {
    match reply {
        Some(reply) => (interpret(&reply.body), ApiResponse::parse(&reply.body)),
        None => (StatusCode::StatusIncorrect, None),
    }
}

fn api_message(response: &Option<ApiResponse>) -> Option<&str> {
    response.as_ref().and_then(ApiResponse::api_message)
}
