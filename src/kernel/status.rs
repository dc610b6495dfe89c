use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::error::JobError;

pub const INITIAL_STATUS: &str = "Set API key and click Generate, or record and use Cover / Add Vocals.";

#[derive(Debug, Default)]
struct StatusInner {
    text: String,
    last_error: Option<String>,
}

/// Human-readable job status for the UI. Written by workers and the
/// completion step, read by the UI timer. The audio thread never touches it.
#[derive(Debug)]
pub struct StatusBoard {
    inner: Mutex<StatusInner>,
    connected: AtomicBool,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatusInner {
                text: INITIAL_STATUS.to_string(),
                last_error: None,
            }),
            connected: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_status(&self, text: impl Into<String>) {
        self.lock().text = text.into();
    }

    /// Starting a new job clears the previous error.
    pub fn begin(&self, text: impl Into<String>) {
        let mut inner = self.lock();
        inner.text = text.into();
        inner.last_error = None;
    }

    pub fn fail(&self, err: &JobError) {
        let msg = err.to_string();
        let mut inner = self.lock();
        inner.text = msg.clone();
        inner.last_error = Some(msg);
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
