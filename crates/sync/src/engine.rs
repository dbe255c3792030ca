//! The live-ops engine.
//!
//! [`LiveOps`] owns one subscription cycle at a time. A cycle starts when an
//! authenticated session appears, and restarts on a page-size change or a
//! refresh outside polling mode. It ends on session loss or shutdown.
//! Subscription and polling tasks call back into the engine through
//! [`EventSink`]; each callback carries the generation of the cycle that
//! produced it and is dropped if that cycle has since been superseded.
//!
//! Locks are always taken in the order `cycle` then `state`, and never held
//! across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use liveops_core::{Alert, Config, DerivedCounts, EmployeeRecord, JobRecord, Provenance};
use liveops_views::{AlertThresholds, DerivedView};

use crate::debounce::SearchDebouncer;
use crate::error::StoreError;
use crate::options::ViewOptions;
use crate::polling::{PolledPage, PollingWorker};
use crate::session::Session;
use crate::sink::EventSink;
use crate::state::{Followup, Phase, RefreshAction, Source, SubscriptionState, SyncState};
use crate::store::{Document, RemoteStore};
use crate::subscription::{SourceQueries, StreamSubscriptionManager, SubscriptionHandles};

/// Everything a consumer renders, derived at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveOpsSnapshot {
    /// Filtered jobs.
    pub jobs: Vec<JobRecord>,
    pub employees: Vec<EmployeeRecord>,
    /// Alerts over the unfiltered merged set.
    pub alerts: Vec<Alert>,
    /// Counts over the unfiltered merged set.
    pub counts: DerivedCounts,
    pub loading: bool,
    pub error: Option<String>,
    pub polling: bool,
    pub phase: Phase,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Cycle ─────────────────────────────────────────────────────

#[derive(Default)]
struct Cycle {
    generation: u64,
    uid: Option<String>,
    handles: Option<SubscriptionHandles>,
    poller: Option<Arc<PollingWorker>>,
    closed: bool,
}

impl Cycle {
    fn teardown(&mut self) {
        if let Some(mut handles) = self.handles.take() {
            handles.stop();
        }
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }
}

// ── Shared engine state ───────────────────────────────────────

struct Shared {
    me: Weak<Shared>,
    store: Arc<dyn RemoteStore>,
    config: Config,
    thresholds: AlertThresholds,
    state: Mutex<SyncState>,
    cycle: Mutex<Cycle>,
    options: Mutex<ViewOptions>,
    search: Mutex<SearchDebouncer>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn sink(&self) -> Option<Arc<dyn EventSink>> {
        self.me.upgrade().map(|shared| shared as Arc<dyn EventSink>)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn on_session(&self, session: &Session) {
        let mut cycle = lock(&self.cycle);
        if cycle.closed {
            return;
        }

        match session.active_uid() {
            Some(uid) => {
                if cycle.uid.as_deref() == Some(uid) && cycle.handles.is_some() {
                    return;
                }
                if cycle.uid.as_deref() != Some(uid) {
                    lock(&self.state).clear_session_data();
                }
                info!(uid, "session active");
                cycle.uid = Some(uid.to_string());
                self.start_cycle(&mut cycle);
            }
            None => {
                cycle.teardown();
                cycle.uid = None;
                {
                    let mut state = lock(&self.state);
                    state.end_cycle(Phase::Idle);
                    if session.auth_ready {
                        state.clear_session_data();
                        info!("signed out, live data cleared");
                    } else {
                        debug!("waiting for auth");
                    }
                }
                lock(&self.search).cancel();
                self.bump();
            }
        }
    }

    /// Tear down whatever is running and open a fresh cycle.
    fn start_cycle(&self, cycle: &mut Cycle) {
        cycle.teardown();

        let page_size = lock(&self.options).effective_page_size(&self.config);
        let queries = SourceQueries::from_config(&self.config.collections, page_size);
        let generation = lock(&self.state).begin_cycle();
        cycle.generation = generation;
        cycle.poller = Some(Arc::new(PollingWorker::new(
            Arc::clone(&self.store),
            &queries,
            self.config.sync.poll_interval(),
        )));

        let Some(sink) = self.sink() else {
            return;
        };
        let manager = StreamSubscriptionManager::new(Arc::clone(&self.store), queries);
        match manager.start(generation, sink) {
            Ok(handles) => {
                debug!(generation, page_size, "cycle subscriptions open");
                cycle.handles = Some(handles);
            }
            Err(e) => {
                warn!(generation, error = %e, "subscription setup failed");
                lock(&self.state).fail_setup(generation, e.to_string());
            }
        }
        self.bump();
    }

    fn follow_up(&self, generation: u64, followup: Followup) {
        match followup {
            Followup::Stale => return,
            Followup::None => {}
            Followup::StartPolling => {
                let cycle = lock(&self.cycle);
                if cycle.generation == generation && !cycle.closed {
                    if let (Some(poller), Some(sink)) = (&cycle.poller, self.sink()) {
                        poller.start(generation, sink);
                    }
                }
            }
            Followup::StopPolling => {
                let cycle = lock(&self.cycle);
                if cycle.generation == generation {
                    if let Some(poller) = &cycle.poller {
                        poller.stop();
                    }
                }
            }
        }
        self.bump();
    }

    fn refresh(&self) {
        let mut cycle = lock(&self.cycle);
        if cycle.closed {
            return;
        }
        let action = lock(&self.state).begin_refresh();
        match action {
            RefreshAction::PollNow(generation) => {
                info!(generation, "manual refresh, polling now");
                if let (Some(poller), Some(sink)) = (cycle.poller.clone(), self.sink()) {
                    poller.start(generation, sink);
                }
            }
            RefreshAction::Resubscribe if cycle.uid.is_some() => {
                info!("manual refresh, resubscribing");
                self.start_cycle(&mut cycle);
            }
            _ => debug!("refresh ignored without a session"),
        }
        drop(cycle);
        self.bump();
    }

    async fn poll(&self) {
        let (generation, poller) = {
            let cycle = lock(&self.cycle);
            match (&cycle.poller, cycle.closed) {
                (Some(poller), false) => (cycle.generation, Arc::clone(poller)),
                _ => return,
            }
        };

        match poller.fetch().await {
            Ok(page) => {
                let (jobs, employees) = decode_page(page);
                lock(&self.state).apply_poll(generation, jobs, employees, true);
            }
            Err(error) => {
                warn!(error = %error, "manual poll failed");
                lock(&self.state).apply_poll_failure(generation, &error);
            }
        }
        self.bump();
    }

    fn set_options(&self, options: ViewOptions) {
        let new_page_size = options.effective_page_size(&self.config);
        let (search_changed, page_changed) = {
            let mut current = lock(&self.options);
            let changes = (
                current.search != options.search,
                current.effective_page_size(&self.config) != new_page_size,
            );
            *current = options.clone();
            changes
        };

        if search_changed {
            lock(&self.search).on_input(options.search);
        }
        if page_changed {
            let mut cycle = lock(&self.cycle);
            if !cycle.closed && cycle.uid.is_some() {
                info!(page_size = new_page_size, "page size changed, restarting subscriptions");
                self.start_cycle(&mut cycle);
            }
        }
        self.bump();
    }

    fn set_search(&self, text: String) {
        lock(&self.options).search = text.clone();
        lock(&self.search).on_input(text);
    }

    fn snapshot_at(&self, now: DateTime<Utc>) -> LiveOpsSnapshot {
        let options = lock(&self.options).clone();
        let committed = lock(&self.search).committed();
        let filter = options.to_filter(committed, &self.config);

        let (records, employees, loading, error, phase) = {
            let state = lock(&self.state);
            (
                state.records().to_vec(),
                state.employees().to_vec(),
                state.loading(),
                state.notice().map(ToString::to_string),
                state.phase(),
            )
        };

        let view = DerivedView::compute(&records, &filter, &self.thresholds, now);
        LiveOpsSnapshot {
            jobs: view.jobs,
            employees,
            alerts: view.alerts,
            counts: view.counts,
            loading,
            error,
            polling: phase == Phase::Degraded,
            phase,
        }
    }

    fn shutdown(&self) {
        let mut cycle = lock(&self.cycle);
        if cycle.closed {
            return;
        }
        cycle.closed = true;
        cycle.teardown();
        cycle.uid = None;
        lock(&self.state).end_cycle(Phase::TornDown);
        lock(&self.search).cancel();
        drop(cycle);
        info!("live-ops engine shut down");
        self.bump();
    }
}

impl EventSink for Shared {
    fn on_snapshot(&self, generation: u64, source: Source, docs: Vec<Document>) {
        let followup = match source.provenance() {
            Some(provenance) => {
                let records = decode_jobs(source, provenance, docs);
                lock(&self.state).apply_jobs(generation, source, records)
            }
            None => {
                let employees = decode_employees(docs);
                if lock(&self.state).apply_employees(generation, employees) {
                    Followup::None
                } else {
                    Followup::Stale
                }
            }
        };
        self.follow_up(generation, followup);
    }

    fn on_error(&self, generation: u64, source: Source, error: StoreError) {
        let followup = lock(&self.state).apply_error(generation, source, &error);
        self.follow_up(generation, followup);
    }

    fn on_poll(&self, generation: u64, result: Result<PolledPage, StoreError>) -> bool {
        let keep_polling = match result {
            Ok(page) => {
                let (jobs, employees) = decode_page(page);
                lock(&self.state).apply_poll(generation, jobs, employees, false)
            }
            Err(error) => lock(&self.state).apply_poll_failure(generation, &error),
        };
        self.bump();
        keep_polling
    }
}

// ── Decoding ──────────────────────────────────────────────────

fn decode_jobs(source: Source, provenance: Provenance, docs: Vec<Document>) -> Vec<JobRecord> {
    docs.into_iter()
        .filter_map(|doc| match JobRecord::from_document(&doc.id, doc.data, provenance) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(source = %source, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

fn decode_employees(docs: Vec<Document>) -> Vec<EmployeeRecord> {
    docs.into_iter()
        .filter_map(|doc| match EmployeeRecord::from_document(&doc.id, doc.data) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(source = %Source::Employees, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

fn decode_page(page: PolledPage) -> (Vec<JobRecord>, Vec<EmployeeRecord>) {
    (
        decode_jobs(Source::Jobs, Provenance::Native, page.jobs),
        decode_employees(page.employees),
    )
}

// ── Public handle ─────────────────────────────────────────────

/// Live operations sync engine.
///
/// Most methods spawn tokio tasks and must be called from within a runtime.
/// Dropping the engine shuts it down.
pub struct LiveOps {
    shared: Arc<Shared>,
}

impl LiveOps {
    pub fn new(store: Arc<dyn RemoteStore>, config: Config, options: ViewOptions) -> Self {
        let (revision, _) = watch::channel(0u64);
        let thresholds = AlertThresholds::from_hours(config.views.long_running_hours);
        let state = SyncState::new(config.sync.escalation_threshold);
        let debounce = config.sync.debounce();

        let shared = Arc::new_cyclic(|me: &Weak<Shared>| {
            let notify = me.clone();
            let search = SearchDebouncer::new(debounce, options.search.clone(), move |committed| {
                if let Some(shared) = notify.upgrade() {
                    debug!(search = %committed, "search applied");
                    shared.bump();
                }
            });
            Shared {
                me: me.clone(),
                store,
                config,
                thresholds,
                state: Mutex::new(state),
                cycle: Mutex::new(Cycle::default()),
                options: Mutex::new(options),
                search: Mutex::new(search),
                revision,
            }
        });
        Self { shared }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Apply an authentication change.
    pub fn on_session(&self, session: &Session) {
        self.shared.on_session(session);
    }

    /// Follow session changes until the sender or the engine goes away.
    pub fn follow_session(&self, mut sessions: watch::Receiver<Session>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            loop {
                let session = sessions.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(shared) => shared.on_session(&session),
                    None => break,
                }
                if sessions.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Replace the view options. A search change is debounced; a page-size
    /// change restarts the subscriptions.
    pub fn set_options(&self, options: ViewOptions) {
        self.shared.set_options(options);
    }

    pub fn set_search(&self, text: impl Into<String>) {
        self.shared.set_search(text.into());
    }

    pub fn options(&self) -> ViewOptions {
        lock(&self.shared.options).clone()
    }

    /// In polling mode, poll immediately and restart the schedule. Otherwise
    /// restart the subscription cycle. Always resets the error counter.
    pub fn refresh(&self) {
        self.shared.refresh();
    }

    /// One out-of-cycle poll applied to the current cycle.
    pub async fn poll(&self) {
        self.shared.poll().await;
    }

    pub fn snapshot(&self) -> LiveOpsSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> LiveOpsSnapshot {
        self.shared.snapshot_at(now)
    }

    /// Revision counter bumped on every observable change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.shared.state).phase()
    }

    pub fn is_polling(&self) -> bool {
        self.phase() == Phase::Degraded
    }

    pub fn subscription_states(&self) -> Vec<(Source, SubscriptionState)> {
        let state = lock(&self.shared.state);
        Source::ALL
            .iter()
            .map(|source| (*source, state.source(*source).clone()))
            .collect()
    }

    /// Stop everything. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl Drop for LiveOps {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
