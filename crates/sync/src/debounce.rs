//! Debounced search text.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::trace;

use crate::scheduler::DelayedTask;

type CommitHook = Arc<dyn Fn(String) + Send + Sync>;

/// Delays committing search input until it has been quiet for a while.
///
/// Every `on_input` cancels the pending commit and schedules a new one, so
/// the committed value changes at most once per quiet period and always ends
/// up equal to the last input.
pub struct SearchDebouncer {
    quiet: Duration,
    raw: String,
    committed: Arc<Mutex<String>>,
    pending: DelayedTask,
    on_commit: CommitHook,
}

impl SearchDebouncer {
    /// `initial` is committed immediately, without waiting.
    pub fn new(
        quiet: Duration,
        initial: impl Into<String>,
        on_commit: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        let initial = initial.into();
        Self {
            quiet,
            raw: initial.clone(),
            committed: Arc::new(Mutex::new(initial)),
            pending: DelayedTask::new(),
            on_commit: Arc::new(on_commit),
        }
    }

    pub fn on_input(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.raw = text.clone();
        let committed = self.committed.clone();
        let hook = self.on_commit.clone();
        self.pending.schedule(self.quiet, async move {
            {
                let mut current = committed.lock().unwrap_or_else(|e| e.into_inner());
                if *current == text {
                    return;
                }
                *current = text.clone();
            }
            trace!(search = %text, "search committed");
            hook(text);
        });
    }

    /// Drop the pending commit, if any.
    pub fn cancel(&mut self) -> bool {
        self.pending.cancel()
    }

    pub fn committed(&self) -> String {
        self.committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Latest input, committed or not.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }
}
