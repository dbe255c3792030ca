//! Derived live-ops views.
//!
//! Everything in this crate is a pure function of the merged record set, the
//! consumer's filter options, and an explicit `now`. Nothing is cached: the
//! sync engine recomputes the full [`DerivedView`] every time a consumer asks
//! for a snapshot.

pub mod aggregate;
pub mod filter;

use chrono::{DateTime, Utc};
use serde::Serialize;

use liveops_core::{Alert, DerivedCounts, JobRecord};

pub use aggregate::{compute_alerts, compute_counts, AlertThresholds};
pub use filter::{filter_jobs, DateRange, StatusFilter, ViewFilter};

/// Everything the presentation layer derives from one merged set.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedView {
    /// Filtered jobs, a subset of the merged set in merged order.
    pub jobs: Vec<JobRecord>,
    /// Counts over the unfiltered merged set.
    pub counts: DerivedCounts,
    /// Alerts over the unfiltered merged set.
    pub alerts: Vec<Alert>,
}

impl DerivedView {
    pub fn compute(
        records: &[JobRecord],
        filter: &ViewFilter,
        thresholds: &AlertThresholds,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            jobs: filter_jobs(records, filter, now),
            counts: compute_counts(records),
            alerts: compute_alerts(records, thresholds, now),
        }
    }
}
