//! Consumer-facing job filtering.
//!
//! Filters are applied in a fixed order: text search, date range, status,
//! then recency retention. Each stage only ever removes records, so the
//! output is always a subset of the input in the input's order.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use liveops_core::{JobRecord, JobStatus};

/// Inclusive instant range. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// A range with no bounds filters nothing.
    pub fn is_active(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if instant < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if instant > end {
                return false;
            }
        }
        true
    }
}

/// Requested status, or everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(JobStatus),
}

impl StatusFilter {
    /// `None`, empty, and `"all"` mean no status filter.
    pub fn from_option(status: Option<&str>) -> Self {
        match status {
            None => StatusFilter::All,
            Some(s) if s.is_empty() || s == "all" => StatusFilter::All,
            Some(s) => StatusFilter::Only(JobStatus::from_label(s)),
        }
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => job.effective_status() == *status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewFilter {
    /// Committed (debounced) search text. Empty means no search.
    pub search: String,
    pub date_range: Option<DateRange>,
    pub status: StatusFilter,
    /// Keep completed jobs regardless of when they finished.
    pub include_past: bool,
    /// Window in which completed jobs remain visible when `include_past` is off.
    pub retention: Duration,
}

impl Default for ViewFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            date_range: None,
            status: StatusFilter::All,
            include_past: false,
            retention: Duration::hours(24),
        }
    }
}

impl ViewFilter {
    pub fn with_retention_hours(mut self, hours: u32) -> Self {
        self.retention = Duration::hours(i64::from(hours));
        self
    }
}

fn contains_ci(field: Option<&str>, needle_lower: &str) -> bool {
    field
        .map(|value| value.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
}

fn matches_search(job: &JobRecord, needle_lower: &str) -> bool {
    contains_ci(job.title.as_deref(), needle_lower)
        || contains_ci(job.client.as_deref(), needle_lower)
        || contains_ci(job.address.as_deref(), needle_lower)
        || contains_ci(job.assigned_to_name.as_deref(), needle_lower)
}

fn matches_range(job: &JobRecord, range: &DateRange) -> bool {
    match job.schedule_anchor() {
        Some(instant) => range.contains(instant),
        None => false,
    }
}

fn within_retention(job: &JobRecord, retention: Duration, now: DateTime<Utc>) -> bool {
    if !job.is_completed() {
        return true;
    }
    match job.completion_instant() {
        Some(finished) => now - finished <= retention,
        None => true,
    }
}

/// Apply search, date range, status and retention filters in that order.
pub fn filter_jobs(records: &[JobRecord], filter: &ViewFilter, now: DateTime<Utc>) -> Vec<JobRecord> {
    let needle = filter.search.to_lowercase();
    let range = filter.date_range.filter(DateRange::is_active);

    let jobs: Vec<JobRecord> = records
        .iter()
        .filter(|job| needle.is_empty() || matches_search(job, &needle))
        .filter(|job| range.as_ref().map_or(true, |r| matches_range(job, r)))
        .filter(|job| filter.status.matches(job))
        .filter(|job| filter.include_past || within_retention(job, filter.retention, now))
        .cloned()
        .collect();

    tracing::trace!(input = records.len(), output = jobs.len(), "jobs filtered");
    jobs
}
