//! Shared sync state and its transitions.
//!
//! `SyncState` lives behind one `std::sync::Mutex` in the engine. Every
//! method here is synchronous and returns what the caller must do next
//! (start or stop polling, resubscribe) so that no lock is ever held while
//! tasks are spawned or awaited.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use liveops_core::{EmployeeRecord, JobRecord, Provenance};

use crate::error::StoreError;
use crate::escalation::{ErrorEscalationTracker, Escalation};
use crate::merger::RecordMerger;

// ── Sources ───────────────────────────────────────────────────

/// One of the three push subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Jobs,
    GuestBookings,
    Employees,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Jobs, Source::GuestBookings, Source::Employees];

    /// Merged-record origin fed by this source; employees feed none.
    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Source::Jobs => Some(Provenance::Native),
            Source::GuestBookings => Some(Provenance::Guest),
            Source::Employees => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Jobs => "jobs",
            Source::GuestBookings => "guest-bookings",
            Source::Employees => "employees",
        }
    }

    fn index(&self) -> usize {
        match self {
            Source::Jobs => 0,
            Source::GuestBookings => 1,
            Source::Employees => 2,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Idle,
    Active,
    Erroring,
    Polling,
}

/// Per-source bookkeeping, reported to consumers for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    pub status: SourceStatus,
    pub consecutive_errors: u32,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<StoreError>,
    pub snapshots: u64,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<StoreError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

// ── Phase & notices ───────────────────────────────────────────

/// Lifecycle of one activation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No authenticated session.
    Idle,
    /// Subscriptions open, waiting for both origins to report.
    Subscribing,
    /// Push delivery trusted.
    Live,
    /// Push delivery distrusted; polling active.
    Degraded,
    /// Shut down, or setup failed.
    TornDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Subscribing => "subscribing",
            Phase::Live => "live",
            Phase::Degraded => "degraded",
            Phase::TornDown => "torn_down",
        };
        f.write_str(s)
    }
}

/// The single user-facing error message. Only the worst current condition
/// is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorNotice {
    Transient { count: u32, threshold: u32 },
    Degraded,
    PollFailed,
    Setup(String),
}

impl ErrorNotice {
    pub fn severity(&self) -> u8 {
        match self {
            ErrorNotice::Transient { .. } => 1,
            ErrorNotice::Degraded => 2,
            ErrorNotice::PollFailed => 3,
            ErrorNotice::Setup(_) => 4,
        }
    }
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorNotice::Transient { count, threshold } => {
                write!(f, "Connection error ({count}/{threshold}) - retrying...")
            }
            ErrorNotice::Degraded => f.write_str("Connection unstable - using polling mode"),
            ErrorNotice::PollFailed => f.write_str("Connection error - using cached data"),
            ErrorNotice::Setup(message) => f.write_str(message),
        }
    }
}

// ── Transition results ────────────────────────────────────────

/// What the engine must do after a push event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    StartPolling,
    StopPolling,
    /// Event belonged to a superseded cycle and was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    PollNow(u64),
    Resubscribe,
    Nothing,
}

// ── State ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SyncState {
    generation: u64,
    phase: Phase,
    merger: RecordMerger,
    published: Vec<JobRecord>,
    employees: Vec<EmployeeRecord>,
    loading: bool,
    notice: Option<ErrorNotice>,
    escalation: ErrorEscalationTracker,
    sources: [SubscriptionState; 3],
}

impl SyncState {
    pub fn new(escalation_threshold: u32) -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
            merger: RecordMerger::new(),
            published: Vec::new(),
            employees: Vec::new(),
            loading: true,
            notice: None,
            escalation: ErrorEscalationTracker::new(escalation_threshold),
            sources: Default::default(),
        }
    }

    // ── Accessors ──

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn notice(&self) -> Option<&ErrorNotice> {
        self.notice.as_ref()
    }

    /// Last published merged set.
    pub fn records(&self) -> &[JobRecord] {
        &self.published
    }

    pub fn employees(&self) -> &[EmployeeRecord] {
        &self.employees
    }

    pub fn source(&self, source: Source) -> &SubscriptionState {
        &self.sources[source.index()]
    }

    pub fn escalation_count(&self) -> u32 {
        self.escalation.count()
    }

    // ── Cycle lifecycle ──

    /// Start a new subscription cycle and return its generation. Published
    /// data stays visible until the new cycle publishes.
    pub fn begin_cycle(&mut self) -> u64 {
        self.generation += 1;
        self.phase = Phase::Subscribing;
        self.merger.reset();
        self.escalation.reset();
        self.notice = None;
        self.loading = true;
        for state in &mut self.sources {
            *state = SubscriptionState {
                status: SourceStatus::Active,
                ..Default::default()
            };
        }
        info!(generation = self.generation, "subscription cycle started");
        self.generation
    }

    /// Invalidate the current cycle so late callbacks are discarded.
    pub fn end_cycle(&mut self, phase: Phase) {
        self.generation += 1;
        self.phase = phase;
        for state in &mut self.sources {
            state.status = SourceStatus::Idle;
        }
        debug!(generation = self.generation, phase = %phase, "subscription cycle ended");
    }

    /// Forget everything tied to the previous session.
    pub fn clear_session_data(&mut self) {
        self.merger.reset();
        self.published.clear();
        self.employees.clear();
        self.notice = None;
        self.loading = false;
    }

    /// Setup failures are hard errors: the cycle ends and loading clears.
    pub fn fail_setup(&mut self, generation: u64, message: String) {
        if !self.is_current(generation) {
            return;
        }
        self.end_cycle(Phase::TornDown);
        self.loading = false;
        self.raise(ErrorNotice::Setup(message));
    }

    // ── Push events ──

    /// Apply a jobs or guest-bookings snapshot.
    pub fn apply_jobs(&mut self, generation: u64, source: Source, records: Vec<JobRecord>) -> Followup {
        if !self.is_current(generation) {
            debug!(source = %source, generation, "discarding stale snapshot");
            return Followup::Stale;
        }
        let Some(provenance) = source.provenance() else {
            return Followup::None;
        };

        let count = records.len();
        self.merger.replace(provenance, records);
        let state = &mut self.sources[source.index()];
        state.snapshots += 1;
        state.consecutive_errors = 0;
        state.status = SourceStatus::Active;
        debug!(source = %source, count, "snapshot applied");

        self.escalation.reset();
        if matches!(self.notice, Some(ErrorNotice::Transient { .. })) {
            self.notice = None;
        }

        let mut followup = Followup::None;
        if source == Source::Jobs && self.phase == Phase::Degraded {
            self.phase = Phase::Live;
            if matches!(self.notice, Some(ErrorNotice::Degraded | ErrorNotice::PollFailed)) {
                self.notice = None;
            }
            info!("push delivery recovered, leaving polling mode");
            followup = Followup::StopPolling;
        }

        self.publish_if_ready();
        followup
    }

    /// Returns whether anything was applied.
    pub fn apply_employees(&mut self, generation: u64, employees: Vec<EmployeeRecord>) -> bool {
        if !self.is_current(generation) {
            debug!(generation, "discarding stale employees snapshot");
            return false;
        }
        let state = &mut self.sources[Source::Employees.index()];
        state.snapshots += 1;
        state.consecutive_errors = 0;
        state.status = SourceStatus::Active;
        self.employees = employees;
        true
    }

    pub fn apply_error(&mut self, generation: u64, source: Source, error: &StoreError) -> Followup {
        if !self.is_current(generation) {
            debug!(source = %source, generation, "discarding stale error");
            return Followup::Stale;
        }
        let state = &mut self.sources[source.index()];
        state.last_error = Some(error.clone());

        if error.is_benign() {
            debug!(source = %source, error = %error, "benign subscription error");
            match source.provenance() {
                Some(provenance) => {
                    self.merger.clear_origin(provenance);
                    if source == Source::Jobs {
                        self.force_publish();
                    } else {
                        self.publish_if_ready();
                    }
                }
                None => self.employees.clear(),
            }
            return Followup::None;
        }

        state.consecutive_errors += 1;
        state.status = if source == Source::Jobs && self.phase == Phase::Degraded {
            SourceStatus::Polling
        } else {
            SourceStatus::Erroring
        };
        warn!(
            source = %source,
            error = %error,
            consecutive = state.consecutive_errors,
            "subscription error"
        );

        match source {
            Source::Jobs => {
                self.merger.mark_reported(Provenance::Native);
                self.publish_if_ready();
                match self.escalation.record(error) {
                    Escalation::Retrying { count, threshold } => {
                        self.raise(ErrorNotice::Transient { count, threshold });
                        Followup::None
                    }
                    Escalation::Escalated { count } if self.phase != Phase::Degraded => {
                        warn!(count, "jobs stream unstable, switching to polling");
                        self.phase = Phase::Degraded;
                        self.sources[Source::Jobs.index()].status = SourceStatus::Polling;
                        self.raise(ErrorNotice::Degraded);
                        Followup::StartPolling
                    }
                    _ => Followup::None,
                }
            }
            Source::GuestBookings => {
                self.merger.mark_reported(Provenance::Guest);
                self.publish_if_ready();
                Followup::None
            }
            Source::Employees => Followup::None,
        }
    }

    // ── Polling ──

    /// Apply a polled page. Scheduled polls only land while degraded; manual
    /// polls land in any active phase. Returns whether the polling loop
    /// should keep going.
    pub fn apply_poll(
        &mut self,
        generation: u64,
        jobs: Vec<JobRecord>,
        employees: Vec<EmployeeRecord>,
        manual: bool,
    ) -> bool {
        if !self.is_current(generation) {
            debug!(generation, "discarding stale poll result");
            return false;
        }
        let degraded = self.phase == Phase::Degraded;
        let active = matches!(self.phase, Phase::Subscribing | Phase::Live | Phase::Degraded);
        if !(degraded || (manual && active)) {
            debug!(phase = %self.phase, "poll result ignored outside polling mode");
            return false;
        }

        info!(jobs = jobs.len(), employees = employees.len(), "poll applied");
        self.merger.replace(Provenance::Native, jobs);
        self.employees = employees;
        self.published = self.merger.merged();
        self.loading = false;
        if self.phase == Phase::Subscribing {
            self.phase = Phase::Live;
        }
        if self.notice == Some(ErrorNotice::PollFailed) {
            self.notice = Some(ErrorNotice::Degraded);
        }
        degraded
    }

    /// A failed poll never stops the schedule.
    pub fn apply_poll_failure(&mut self, generation: u64, error: &StoreError) -> bool {
        if !self.is_current(generation) || self.phase != Phase::Degraded {
            return false;
        }
        if error.is_benign() {
            debug!(error = %error, "benign poll failure");
        } else {
            warn!(error = %error, "poll failed, keeping cached data");
            self.raise(ErrorNotice::PollFailed);
        }
        true
    }

    /// Manual refresh: reset the error counter and pick the action for the
    /// current phase.
    pub fn begin_refresh(&mut self) -> RefreshAction {
        self.escalation.reset();
        if matches!(self.notice, Some(ErrorNotice::Transient { .. })) {
            self.notice = None;
        }
        match self.phase {
            Phase::Degraded => RefreshAction::PollNow(self.generation),
            Phase::Subscribing | Phase::Live | Phase::TornDown => RefreshAction::Resubscribe,
            Phase::Idle => RefreshAction::Nothing,
        }
    }

    // ── Internals ──

    /// Publish the merged set once both origins have reported.
    fn publish_if_ready(&mut self) -> bool {
        if !self.merger.is_ready() {
            return false;
        }
        self.published = self.merger.merged();
        self.loading = false;
        if self.phase == Phase::Subscribing {
            self.phase = Phase::Live;
            info!(records = self.published.len(), "both origins reported, live");
        }
        true
    }

    /// A denied jobs stream ends loading even before guest bookings report.
    fn force_publish(&mut self) {
        if !self.publish_if_ready() {
            self.published = self.merger.merged();
            self.loading = false;
        }
    }

    /// Show `notice` unless something worse is already showing.
    fn raise(&mut self, notice: ErrorNotice) {
        let current = self.notice.as_ref().map_or(0, ErrorNotice::severity);
        if notice.severity() >= current {
            self.notice = Some(notice);
        }
    }
}
