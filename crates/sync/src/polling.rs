//! Fallback polling while push delivery is distrusted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::StoreError;
use crate::scheduler::DelayedTask;
use crate::sink::EventSink;
use crate::store::{Document, Query, RemoteStore};
use crate::subscription::SourceQueries;

/// One polled page of jobs and employees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolledPage {
    pub jobs: Vec<Document>,
    pub employees: Vec<Document>,
}

/// Fetches a jobs page and the employee list on a fixed interval.
///
/// At most one loop is alive: starting again supersedes the running loop
/// and fetches immediately.
pub struct PollingWorker {
    store: Arc<dyn RemoteStore>,
    jobs_query: Query,
    employees_query: Query,
    interval: Duration,
    task: Mutex<DelayedTask>,
}

impl PollingWorker {
    pub fn new(store: Arc<dyn RemoteStore>, queries: &SourceQueries, interval: Duration) -> Self {
        Self {
            store,
            jobs_query: queries.jobs.clone(),
            employees_query: queries.employees.clone(),
            interval,
            task: Mutex::new(DelayedTask::new()),
        }
    }

    /// One out-of-cycle fetch of both queries, run concurrently.
    pub async fn fetch(&self) -> Result<PolledPage, StoreError> {
        fetch_page(self.store.as_ref(), &self.jobs_query, &self.employees_query).await
    }

    /// Start (or restart) the loop for `generation`. Runs until the sink
    /// says stop or [`stop`](Self::stop) is called.
    pub fn start(&self, generation: u64, sink: Arc<dyn EventSink>) {
        let store = Arc::clone(&self.store);
        let jobs_query = self.jobs_query.clone();
        let employees_query = self.employees_query.clone();
        let interval = self.interval;

        info!(generation, interval_secs = interval.as_secs(), "polling started");
        self.lock_task().schedule(Duration::ZERO, async move {
            loop {
                let result = fetch_page(store.as_ref(), &jobs_query, &employees_query).await;
                if !sink.on_poll(generation, result) {
                    debug!(generation, "polling loop finished");
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    /// Returns whether a loop was running.
    pub fn stop(&self) -> bool {
        let stopped = self.lock_task().cancel();
        if stopped {
            info!("polling stopped");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.lock_task().is_pending()
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, DelayedTask> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn fetch_page(
    store: &dyn RemoteStore,
    jobs_query: &Query,
    employees_query: &Query,
) -> Result<PolledPage, StoreError> {
    let (jobs, employees) = tokio::join!(store.fetch(jobs_query), store.fetch(employees_query));
    Ok(PolledPage {
        jobs: jobs?,
        employees: employees?,
    })
}
