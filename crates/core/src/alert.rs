use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::JobRecord;

/// Operational alert categories raised against individual jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Scheduled time has passed and the job is not completed.
    SlaBreach,
    /// Job has been in progress for longer than the long-running threshold.
    LongRunning,
    /// Job was completed without any proof photos.
    MissingProof,
}

impl AlertKind {
    /// Prefix used to build deterministic alert ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            AlertKind::SlaBreach => "sla",
            AlertKind::LongRunning => "long",
            AlertKind::MissingProof => "proof",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::SlaBreach => "sla_breach",
            AlertKind::LongRunning => "long_running",
            AlertKind::MissingProof => "missing_proof",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// `{prefix}-{qualified job id}`; identical across recomputations.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Provenance-qualified id of the job this alert is about.
    pub job_id: String,
}

impl Alert {
    pub fn for_job(
        kind: AlertKind,
        job: &JobRecord,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let job_id = job.qualified_id();
        Self {
            id: format!("{}-{}", kind.id_prefix(), job_id),
            kind,
            message: message.into(),
            timestamp: now,
            job_id,
        }
    }
}

/// Status aggregates over the unfiltered merged set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedCounts {
    pub total_jobs: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub pending: usize,
}

impl DerivedCounts {
    /// The bucketed counts never exceed the total.
    pub fn is_consistent(&self) -> bool {
        self.in_progress + self.completed + self.pending <= self.total_jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Provenance;

    #[test]
    fn alert_id_is_prefix_and_qualified_job_id() {
        let now = Utc::now();
        let native = JobRecord::new("42", Provenance::Native);
        let guest = JobRecord::new("42", Provenance::Guest);

        let a = Alert::for_job(AlertKind::SlaBreach, &native, "x", now);
        let b = Alert::for_job(AlertKind::SlaBreach, &guest, "x", now);

        assert_eq!(a.id, "sla-42");
        assert_eq!(b.id, "sla-guest/42");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn alert_serializes_kind_as_type() {
        let job = JobRecord::new("7", Provenance::Native);
        let alert = Alert::for_job(AlertKind::MissingProof, &job, "m", Utc::now());
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "missing_proof");
        assert_eq!(json["jobId"], "7");
    }
}
