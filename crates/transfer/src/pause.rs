use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared pause flag.
///
/// Clones share the same flag, so the gate handed to the orchestrator and
/// the one kept by the UI observe each other's changes. Checked before a
/// request is issued and again when its reply arrives.
#[derive(Debug, Clone, Default)]
pub struct PauseGate {
    paused: Arc<AtomicBool>,
}

impl PauseGate {
    /// Creates an open (not paused) gate.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}
