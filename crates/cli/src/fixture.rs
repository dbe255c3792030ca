//! Fixture files for offline runs.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::warn;

use liveops_core::{JobRecord, Provenance};
use liveops_sync::{Document, MemoryStore, RecordMerger};

/// Raw documents per collection.
#[derive(Debug, Default)]
pub struct Fixture {
    pub jobs: Vec<Document>,
    pub guest_bookings: Vec<Document>,
    pub users: Vec<Document>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture '{}'", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("fixture '{}' is not valid JSON", path.display()))?;
        Self::from_value(value)
    }

    /// A bare array is the jobs collection; an object may carry `jobs`,
    /// `guestBookings` and `users`.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self {
                jobs: documents("jobs", items)?,
                ..Default::default()
            }),
            Value::Object(mut map) => {
                let mut take = |key: &str| -> Result<Vec<Document>> {
                    match map.remove(key) {
                        Some(Value::Array(items)) => documents(key, items),
                        Some(Value::Null) | None => Ok(Vec::new()),
                        Some(_) => bail!("fixture field '{key}' must be an array"),
                    }
                };
                Ok(Self {
                    jobs: take("jobs")?,
                    guest_bookings: take("guestBookings")?,
                    users: take("users")?,
                })
            }
            _ => bail!("fixture must be a JSON array or object"),
        }
    }

    /// Decode and merge both job origins the way the engine would.
    pub fn merged_records(&self) -> Vec<JobRecord> {
        let mut merger = RecordMerger::new();
        merger.replace(Provenance::Native, decode(&self.jobs, Provenance::Native));
        merger.replace(Provenance::Guest, decode(&self.guest_bookings, Provenance::Guest));
        merger.merged()
    }

    pub fn seed(&self, store: &MemoryStore, config: &liveops_core::Config) {
        store.set_collection(&config.collections.jobs, self.jobs.clone());
        store.set_collection(&config.collections.guest_bookings, self.guest_bookings.clone());
        store.set_collection(&config.collections.users, self.users.clone());
    }
}

/// Every entry needs a string `id`; it is split off the body.
fn documents(collection: &str, items: Vec<Value>) -> Result<Vec<Document>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            let id = item
                .as_object_mut()
                .and_then(|obj| obj.remove("id"))
                .and_then(|id| id.as_str().map(str::to_string))
                .with_context(|| format!("{collection}[{i}] has no string 'id'"))?;
            Ok(Document::new(id, item))
        })
        .collect()
}

fn decode(docs: &[Document], provenance: Provenance) -> Vec<JobRecord> {
    docs.iter()
        .filter_map(
            |doc| match JobRecord::from_document(&doc.id, doc.data.clone(), provenance) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "skipping fixture document");
                    None
                }
            },
        )
        .collect()
}
