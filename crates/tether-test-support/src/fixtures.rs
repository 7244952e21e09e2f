//! Listener fixtures and payload builders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_events::TerminalOutput;

/// Listener that records every payload it receives.
#[derive(Debug)]
pub struct RecordingListener<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for RecordingListener<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<T> Default for RecordingListener<T> {
    fn default() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Send + 'static> RecordingListener<T> {
    /// Construct an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to hand to a subscribe call; appends each payload.
    #[must_use]
    pub fn listener(&self) -> impl Fn(T) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |payload| lock(&seen).push(payload)
    }

    /// Number of payloads received so far.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.seen).len()
    }

    /// Whether no payload has been received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.seen).is_empty()
    }
}

impl<T: Clone + Send + 'static> RecordingListener<T> {
    /// Copy of every payload received, in arrival order.
    #[must_use]
    pub fn payloads(&self) -> Vec<T> {
        lock(&self.seen).clone()
    }
}

/// Counter for argument-less listeners such as the updater-check signal.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    /// Construct a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that increments the counter.
    #[must_use]
    pub fn callback(&self) -> impl Fn() + Send + Sync + 'static {
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Number of invocations observed.
    #[must_use]
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Build a terminal output payload.
#[must_use]
pub fn terminal_output(workspace_id: &str, terminal_id: &str, data: &str) -> TerminalOutput {
    TerminalOutput {
        workspace_id: workspace_id.to_string(),
        terminal_id: terminal_id.to_string(),
        data: data.to_string(),
    }
}

fn lock<T>(seen: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    seen.lock().unwrap_or_else(PoisonError::into_inner)
}
