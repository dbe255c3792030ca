//! Counts and alerts over the unfiltered merged set.

use chrono::{DateTime, Duration, Utc};

use liveops_core::{Alert, AlertKind, DerivedCounts, JobRecord, JobStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    /// In-progress jobs older than this raise `long_running`.
    pub long_running: Duration,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            long_running: Duration::hours(4),
        }
    }
}

impl AlertThresholds {
    pub fn from_hours(long_running_hours: u32) -> Self {
        Self {
            long_running: Duration::hours(i64::from(long_running_hours)),
        }
    }
}

pub fn compute_counts(records: &[JobRecord]) -> DerivedCounts {
    let mut counts = DerivedCounts {
        total_jobs: records.len(),
        ..Default::default()
    };
    for job in records {
        match job.status {
            Some(JobStatus::InProgress) => counts.in_progress += 1,
            Some(JobStatus::Completed) => counts.completed += 1,
            Some(JobStatus::Pending) | None => counts.pending += 1,
            _ => {}
        }
    }
    counts
}

/// Regenerate every alert from scratch. A record can raise several alerts;
/// output order follows record order, then sla / long / proof.
pub fn compute_alerts(
    records: &[JobRecord],
    thresholds: &AlertThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for job in records {
        let title = job.title_or_untitled();

        if let Some(scheduled) = job.scheduled_date {
            if scheduled < now && !job.is_completed() {
                alerts.push(Alert::for_job(
                    AlertKind::SlaBreach,
                    job,
                    format!("SLA breach: {title} is overdue"),
                    now,
                ));
            }
        }

        if job.has_status(&JobStatus::InProgress) {
            if let Some(started) = job.start_instant() {
                if now - started > thresholds.long_running {
                    alerts.push(Alert::for_job(
                        AlertKind::LongRunning,
                        job,
                        format!(
                            "Job {title} has been running for over {} hours",
                            thresholds.long_running.num_hours()
                        ),
                        now,
                    ));
                }
            }
        }

        if job.is_completed() && job.proof_photos.is_empty() {
            alerts.push(Alert::for_job(
                AlertKind::MissingProof,
                job,
                format!("Missing proof photos for {title}"),
                now,
            ));
        }
    }

    alerts
}
