//! Push subscription lifecycle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use liveops_core::config::CollectionConfig;

use crate::error::SetupError;
use crate::sink::EventSink;
use crate::state::Source;
use crate::store::{Query, RemoteStore, Subscription, Unsubscribe};

/// The three queries one cycle subscribes to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQueries {
    pub jobs: Query,
    pub guest_bookings: Query,
    pub employees: Query,
}

impl SourceQueries {
    pub fn from_config(collections: &CollectionConfig, page_size: usize) -> Self {
        Self {
            jobs: Query::collection(&collections.jobs)
                .order_by_desc("createdAt")
                .limit(page_size),
            guest_bookings: Query::collection(&collections.guest_bookings)
                .order_by_desc("createdAt")
                .limit(page_size),
            employees: Query::collection(&collections.users)
                .where_eq("userType", collections.employee_user_type.as_str()),
        }
    }

    pub fn get(&self, source: Source) -> &Query {
        match source {
            Source::Jobs => &self.jobs,
            Source::GuestBookings => &self.guest_bookings,
            Source::Employees => &self.employees,
        }
    }
}

struct Running {
    source: Source,
    task: JoinHandle<()>,
    unsubscribe: Unsubscribe,
}

/// Handles for one cycle's subscriptions. Stopping is idempotent and also
/// happens on drop.
pub struct SubscriptionHandles {
    generation: u64,
    running: Vec<Running>,
}

impl SubscriptionHandles {
    /// Abort the drain tasks and release the store subscriptions. Returns
    /// whether anything was still running.
    pub fn stop(&mut self) -> bool {
        if self.running.is_empty() {
            return false;
        }
        for mut entry in self.running.drain(..) {
            entry.task.abort();
            entry.unsubscribe.run();
            debug!(source = %entry.source, generation = self.generation, "subscription stopped");
        }
        info!(generation = self.generation, "subscriptions torn down");
        true
    }
}

impl Drop for SubscriptionHandles {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct StreamSubscriptionManager {
    store: Arc<dyn RemoteStore>,
    queries: SourceQueries,
}

impl StreamSubscriptionManager {
    pub fn new(store: Arc<dyn RemoteStore>, queries: SourceQueries) -> Self {
        Self { store, queries }
    }

    /// Open all three subscriptions and spawn one drain task per source.
    /// If any subscription is refused, the ones already opened are released.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        generation: u64,
        sink: Arc<dyn EventSink>,
    ) -> Result<SubscriptionHandles, SetupError> {
        let mut opened: Vec<(Source, Subscription)> = Vec::with_capacity(Source::ALL.len());
        for source in Source::ALL {
            let query = self.queries.get(source);
            match self.store.subscribe(query) {
                Ok(sub) => {
                    debug!(source = %source, query = %query, generation, "subscription opened");
                    opened.push((source, sub));
                }
                Err(error) => {
                    warn!(source = %source, error = %error, "subscription refused");
                    for (_, mut sub) in opened {
                        sub.unsubscribe.run();
                    }
                    return Err(SetupError {
                        stream: source,
                        error,
                    });
                }
            }
        }

        let running = opened
            .into_iter()
            .map(|(source, sub)| {
                let Subscription {
                    mut events,
                    unsubscribe,
                } = sub;
                let sink = Arc::clone(&sink);
                let task = tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        match event {
                            Ok(docs) => sink.on_snapshot(generation, source, docs),
                            Err(error) => sink.on_error(generation, source, error),
                        }
                    }
                    debug!(source = %source, generation, "subscription channel closed");
                });
                Running {
                    source,
                    task,
                    unsubscribe,
                }
            })
            .collect();

        info!(generation, "subscriptions started");
        Ok(SubscriptionHandles {
            generation,
            running,
        })
    }
}
