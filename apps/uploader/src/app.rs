//! Wires the transport, orchestrator and driver together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use osvup_transfer::{HttpTransport, PauseGate, SpeedCalculator, read_attachment};
use osvup_upload::precondition::{
    check_new_sequence, check_photo, check_sequence_finished, check_video,
};
use osvup_upload::{
    DriveOutcome, RetryNotice, Sequence, SequenceUploader, SharedSequence, UploadActivity,
    UploadEvent, UploadOrchestrator, load_sequence,
};
use tokio::sync::{mpsc, watch};

use crate::config::Config;

/// Environment variable consulted for the access token.
pub const TOKEN_ENV: &str = "OSVUP_TOKEN";

/// Picks the first non-empty token: command line, environment, manifest,
/// configuration.
pub fn resolve_token(
    cli: Option<&str>,
    env: Option<&str>,
    manifest: &str,
    config: &str,
) -> String {
    [cli, env, Some(manifest), Some(config)]
        .into_iter()
        .flatten()
        .find(|token| !token.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn load(path: &Path, token: Option<&str>, config: &Config) -> anyhow::Result<Sequence> {
    let mut sequence = load_sequence(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    let env = std::env::var(TOKEN_ENV).ok();
    sequence.token = resolve_token(token, env.as_deref(), &sequence.token, &config.access_token);
    Ok(sequence)
}

/// Uploads every manifest in order. Ctrl-C pauses the upload.
pub async fn upload(config: Config, manifests: &[PathBuf], token: Option<&str>) -> anyhow::Result<()> {
    let sequences = manifests
        .iter()
        .map(|path| load(path, token, &config).map(Sequence::into_shared))
        .collect::<anyhow::Result<Vec<SharedSequence>>>()?;

    let transport = HttpTransport::new(config.request_timeout())
        .context("failed to build HTTP client")?;
    let gate = PauseGate::new();
    let mut orchestrator =
        UploadOrchestrator::new(Arc::new(transport), gate.clone(), config.upload_config());
    let events = orchestrator
        .take_events()
        .context("event receiver already taken")?;
    let printer = tokio::spawn(print_events(events, orchestrator.activity()));

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, pausing upload");
            gate.pause();
        }
    });

    tracing::info!(
        sequences = sequences.len(),
        endpoint = %orchestrator.config().endpoints.base_url(),
        "starting upload"
    );
    let outcomes = SequenceUploader::new(&orchestrator)
        .upload_all(&sequences)
        .await;

    interrupt.abort();
    drop(orchestrator);
    let _ = printer.await;

    let mut incomplete = 0;
    for (index, (path, sequence)) in manifests.iter().zip(&sequences).enumerate() {
        let line = match outcomes.get(index) {
            Some(DriveOutcome::Finished) => "finished".to_string(),
            Some(DriveOutcome::Paused) => "paused".to_string(),
            Some(DriveOutcome::Blocked {
                operation,
                item_index: Some(item),
                reason,
            }) => format!("blocked: {operation} {item}: {reason}"),
            Some(DriveOutcome::Blocked {
                operation, reason, ..
            }) => format!("blocked: {operation}: {reason}"),
            Some(DriveOutcome::Rejected) => "rejected: access token refused".to_string(),
            None => "not started".to_string(),
        };
        if !matches!(outcomes.get(index), Some(DriveOutcome::Finished)) {
            incomplete += 1;
        }
        let seq = sequence.lock().await;
        println!(
            "{}: {line} ({}/{} files)",
            path.display(),
            seq.done_count(),
            seq.photos.len() + seq.videos.len()
        );
    }

    if incomplete > 0 {
        anyhow::bail!("{incomplete} of {} sequences not uploaded", manifests.len());
    }
    Ok(())
}

/// Prints what each unit of a sequence still needs before it can be sent.
pub async fn inspect(config: &Config, manifest: &Path, token: Option<&str>) -> anyhow::Result<()> {
    let sequence = load(manifest, token, config)?;

    let metadata = match &sequence.metadata.path {
        Some(path) => read_attachment(path).await,
        None => Vec::new(),
    };
    println!("sequence: {}", verdict(check_new_sequence(&sequence, &metadata)));

    // Photo and video checks assume the sequence will be created.
    let mut created = sequence.clone();
    created.sequence_id = 0;
    for (index, photo) in sequence.photos.iter().enumerate() {
        let data = read_attachment(&photo.path).await;
        println!(
            "photo {index} ({}): {}",
            photo.path.display(),
            verdict(check_photo(&created, photo, &data))
        );
    }
    for (index, video) in sequence.videos.iter().enumerate() {
        let data = read_attachment(&video.path).await;
        println!(
            "video {index} ({}): {}",
            video.path.display(),
            verdict(check_video(&created, &data))
        );
    }
    println!("finish: {}", verdict(check_sequence_finished(&created)));
    Ok(())
}

fn verdict<E: std::fmt::Display>(result: Result<(), E>) -> String {
    match result {
        Ok(()) => "ready".to_string(),
        Err(reason) => format!("blocked ({reason})"),
    }
}

async fn print_events(
    mut events: mpsc::UnboundedReceiver<UploadEvent>,
    mut activity: watch::Receiver<UploadActivity>,
) {
    let mut printer = EventPrinter::default();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => tracing::info!("{}", printer.describe(&event)),
                None => break,
            },
            changed = activity.changed() => {
                if changed.is_err() {
                    // Orchestrator gone; flush what is left.
                    while let Some(event) = events.recv().await {
                        tracing::info!("{}", printer.describe(&event));
                    }
                    break;
                }
                let current = activity.borrow_and_update().clone();
                if let Some(line) = printer.observe(&current) {
                    tracing::warn!("{line}");
                }
            }
        }
    }
}

/// Turns events into log lines and tracks transfer speed.
#[derive(Default)]
struct EventPrinter {
    speed: SpeedCalculator,
    last_total: u64,
    last_retry: Option<RetryNotice>,
}

impl EventPrinter {
    fn describe(&mut self, event: &UploadEvent) -> String {
        match event {
            UploadEvent::SequenceCreated { sequence_index } => {
                format!("sequence {sequence_index} created")
            }
            UploadEvent::SequenceFinished { sequence_index } => {
                format!("sequence {sequence_index} finished")
            }
            UploadEvent::PhotoUploaded {
                sequence_index,
                photo_index,
            } => {
                self.speed.reset();
                format!("sequence {sequence_index}: photo {photo_index} uploaded")
            }
            UploadEvent::VideoUploaded {
                sequence_index,
                video_index,
            } => {
                self.speed.reset();
                format!("sequence {sequence_index}: video {video_index} uploaded")
            }
            UploadEvent::ErrorFound { sequence_index } => {
                format!("sequence {sequence_index}: access token rejected")
            }
        }
    }

    /// Feeds the speed calculator. Returns a line when a new retry was
    /// scheduled.
    fn observe(&mut self, activity: &UploadActivity) -> Option<String> {
        // Totals restart at zero for every request.
        let delta = activity
            .bytes_sent
            .checked_sub(self.last_total)
            .unwrap_or(activity.bytes_sent);
        self.last_total = activity.bytes_sent;
        self.speed.add_sample(delta);

        if activity.retry == self.last_retry {
            return None;
        }
        self.last_retry = activity.retry.clone();
        let RetryNotice {
            operation,
            sequence_index,
            attempt,
            delay,
            ..
        } = activity.retry.as_ref()?;
        Some(format!(
            "sequence {sequence_index}: {operation} attempt {attempt} failed, retrying in {delay:?} ({:.0} B/s)",
            self.speed.bytes_per_second()
        ))
    }
}
