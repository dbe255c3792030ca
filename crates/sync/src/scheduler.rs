//! Cancellable one-shot timer over `tokio::time`.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Holds at most one pending task. Scheduling again replaces (aborts) the
/// previous one; dropping the holder cancels whatever is still pending.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct DelayedTask {
    handle: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` after `delay`. A zero delay spawns immediately.
    pub fn schedule<F>(&mut self, delay: Duration, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            fut.await;
        }));
    }

    /// Abort the pending task. Returns whether anything was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
