use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::LiveOpsError;
use crate::timestamp;

/// Which remote collection a merged record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// A job from the `jobs` collection.
    #[default]
    Native,
    /// A booking from the `guest-bookings` collection.
    Guest,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Native => "native",
            Provenance::Guest => "guest",
        }
    }

    /// Qualify a raw document id so native and guest ids never collide.
    pub fn qualify(&self, id: &str) -> String {
        match self {
            Provenance::Native => id.to_string(),
            Provenance::Guest => format!("guest/{id}"),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status as written by the admin and employee apps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    /// Any status label this subsystem does not interpret (e.g. "Cancelled").
    Other(String),
}

impl JobStatus {
    /// Map a stored label onto a status. Labels are matched exactly.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Pending" => JobStatus::Pending,
            "Scheduled" => JobStatus::Scheduled,
            "In Progress" => JobStatus::InProgress,
            "Completed" => JobStatus::Completed,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Scheduled => "Scheduled",
            JobStatus::InProgress => "In Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Other(label) => label,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(JobStatus::from_label(&label))
    }
}

/// Empty, null, and non-string statuses are all "absent".
fn status_opt<'de, D>(deserializer: D) -> Result<Option<JobStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(JobStatus::from_label(&s)),
        _ => None,
    })
}

fn list_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    })
}

/// A job or guest booking as held in the merged live-ops view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Document id, unique within its provenance.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "status_opt")]
    pub status: Option<JobStatus>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub assigned_to_name: Option<String>,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub proof_photos: Vec<Value>,
    #[serde(default)]
    pub provenance: Provenance,
    /// Remaining document fields, passed through untouched for presentation.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    /// A bare record with only an id and provenance set.
    pub fn new(id: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            id: id.into(),
            title: None,
            client: None,
            address: None,
            status: None,
            scheduled_date: None,
            completed_at: None,
            updated_at: None,
            started_at: None,
            created_at: None,
            assigned_to: None,
            assigned_to_name: None,
            proof_photos: Vec::new(),
            provenance,
            extra: Map::new(),
        }
    }

    /// Decode a remote document body. The document id and provenance always
    /// override whatever the body itself claims.
    pub fn from_document(
        id: &str,
        data: Value,
        provenance: Provenance,
    ) -> Result<Self, LiveOpsError> {
        if !data.is_object() {
            return Err(LiveOpsError::InvalidDocument(id.to_string()));
        }
        let mut record: JobRecord =
            serde_json::from_value(data).map_err(|e| LiveOpsError::decode(id, e))?;
        record.id = id.to_string();
        record.provenance = provenance;
        Ok(record)
    }

    /// Id qualified by provenance; unique across the whole merged set.
    pub fn qualified_id(&self) -> String {
        self.provenance.qualify(&self.id)
    }

    /// Status with absence read as `Pending`.
    pub fn effective_status(&self) -> JobStatus {
        self.status.clone().unwrap_or(JobStatus::Pending)
    }

    pub fn has_status(&self, status: &JobStatus) -> bool {
        self.status.as_ref() == Some(status)
    }

    pub fn is_completed(&self) -> bool {
        self.has_status(&JobStatus::Completed)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, None | Some(JobStatus::Pending))
    }

    /// The instant used for date-range filtering.
    pub fn schedule_anchor(&self) -> Option<DateTime<Utc>> {
        self.scheduled_date.or(self.created_at)
    }

    /// The instant a completed job finished (falls back to last update).
    pub fn completion_instant(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.updated_at)
    }

    /// The instant an in-progress job started (falls back to last update).
    pub fn start_instant(&self) -> Option<DateTime<Utc>> {
        self.started_at.or(self.updated_at)
    }

    pub fn title_or_untitled(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled job")
    }
}

/// An employee profile from the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmployeeRecord {
    pub fn from_document(id: &str, data: Value) -> Result<Self, LiveOpsError> {
        if !data.is_object() {
            return Err(LiveOpsError::InvalidDocument(id.to_string()));
        }
        let mut record: EmployeeRecord =
            serde_json::from_value(data).map_err(|e| LiveOpsError::decode(id, e))?;
        record.id = id.to_string();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_job_document() {
        let data = json!({
            "title": "Melbourne CBD Office Complex",
            "client": "TechCorp Australia",
            "address": "123 Collins Street",
            "status": "In Progress",
            "scheduledDate": "2024-01-15",
            "startedAt": {"seconds": 1_705_280_400, "nanoseconds": 0},
            "createdAt": "2024-01-10T08:00:00Z",
            "assignedToName": "Sam",
            "proofPhotos": ["a.jpg"],
            "priority": "High",
        });
        let job = JobRecord::from_document("job-1", data, Provenance::Native).unwrap();

        assert_eq!(job.id, "job-1");
        assert_eq!(job.status, Some(JobStatus::InProgress));
        assert!(job.scheduled_date.is_some());
        assert!(job.started_at.is_some());
        assert_eq!(job.proof_photos.len(), 1);
        assert_eq!(job.extra.get("priority"), Some(&json!("High")));
        assert_eq!(job.provenance, Provenance::Native);
    }

    #[test]
    fn missing_and_empty_status_are_absent() {
        let a = JobRecord::from_document("a", json!({}), Provenance::Native).unwrap();
        let b = JobRecord::from_document("b", json!({"status": ""}), Provenance::Native).unwrap();
        let c = JobRecord::from_document("c", json!({"status": null}), Provenance::Native).unwrap();
        for job in [a, b, c] {
            assert!(job.status.is_none());
            assert!(job.is_pending());
            assert_eq!(job.effective_status(), JobStatus::Pending);
        }
    }

    #[test]
    fn unknown_status_is_preserved() {
        let job =
            JobRecord::from_document("x", json!({"status": "Cancelled"}), Provenance::Native)
                .unwrap();
        assert_eq!(job.status, Some(JobStatus::Other("Cancelled".into())));
        assert!(!job.is_pending());
        assert!(!job.is_completed());
    }

    #[test]
    fn document_id_and_provenance_win_over_body() {
        let job = JobRecord::from_document(
            "real",
            json!({"id": "spoofed", "provenance": "native"}),
            Provenance::Guest,
        )
        .unwrap();
        assert_eq!(job.id, "real");
        assert_eq!(job.provenance, Provenance::Guest);
        assert_eq!(job.qualified_id(), "guest/real");
    }

    #[test]
    fn null_proof_photos_decode_as_empty() {
        let job =
            JobRecord::from_document("p", json!({"proofPhotos": null}), Provenance::Native)
                .unwrap();
        assert!(job.proof_photos.is_empty());
    }

    #[test]
    fn non_object_document_is_rejected() {
        let err = JobRecord::from_document("bad", json!([1, 2]), Provenance::Native).unwrap_err();
        assert!(matches!(err, LiveOpsError::InvalidDocument(id) if id == "bad"));
    }

    #[test]
    fn mistyped_field_is_a_decode_error() {
        let err =
            JobRecord::from_document("bad", json!({"title": 42}), Provenance::Native).unwrap_err();
        assert!(matches!(err, LiveOpsError::Decode { .. }));
    }

    #[test]
    fn completion_falls_back_to_updated_at() {
        let job = JobRecord::from_document(
            "c",
            json!({"status": "Completed", "updatedAt": "2024-02-01T00:00:00Z"}),
            Provenance::Native,
        )
        .unwrap();
        assert_eq!(job.completion_instant(), job.updated_at);
    }

    #[test]
    fn status_serializes_as_label() {
        let json = serde_json::to_value(JobStatus::InProgress).unwrap();
        assert_eq!(json, json!("In Progress"));
    }

    #[test]
    fn decodes_employee() {
        let emp = EmployeeRecord::from_document(
            "u1",
            json!({"name": "Alex", "email": "alex@example.com", "userType": "employee", "role": "cleaner"}),
        )
        .unwrap();
        assert_eq!(emp.id, "u1");
        assert_eq!(emp.user_type.as_deref(), Some("employee"));
        assert_eq!(emp.extra.get("role"), Some(&json!("cleaner")));
    }
}
