//! Two-origin record merging.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use liveops_core::{JobRecord, Provenance};

/// Keeps the last-known contribution of each origin, keyed by id.
///
/// A snapshot from one origin replaces that origin's contribution wholesale
/// and leaves the other untouched. Readiness means both origins have
/// reported since the last [`reset`](Self::reset).
#[derive(Debug, Default, Clone)]
pub struct RecordMerger {
    native: HashMap<String, JobRecord>,
    guest: HashMap<String, JobRecord>,
    native_reported: bool,
    guest_reported: bool,
}

impl RecordMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one origin's contribution. Each record is re-tagged with
    /// `provenance`; a duplicated id keeps its last occurrence.
    pub fn replace(&mut self, provenance: Provenance, records: Vec<JobRecord>) {
        let map = self.map_mut(provenance);
        map.clear();
        for mut record in records {
            record.provenance = provenance;
            map.insert(record.id.clone(), record);
        }
        self.mark_reported(provenance);
    }

    /// Drop one origin's contribution (benign error) and count it as reported.
    pub fn clear_origin(&mut self, provenance: Provenance) {
        self.map_mut(provenance).clear();
        self.mark_reported(provenance);
    }

    pub fn mark_reported(&mut self, provenance: Provenance) {
        match provenance {
            Provenance::Native => self.native_reported = true,
            Provenance::Guest => self.guest_reported = true,
        }
    }

    pub fn has_reported(&self, provenance: Provenance) -> bool {
        match provenance {
            Provenance::Native => self.native_reported,
            Provenance::Guest => self.guest_reported,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.native_reported && self.guest_reported
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.native.len() + self.guest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both contributions, newest first. Missing creation instants sort as
    /// the epoch; ties break on the qualified id.
    pub fn merged(&self) -> Vec<JobRecord> {
        let mut out: Vec<JobRecord> = self
            .native
            .values()
            .chain(self.guest.values())
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            created_key(b)
                .cmp(&created_key(a))
                .then_with(|| a.qualified_id().cmp(&b.qualified_id()))
        });
        out
    }

    fn map_mut(&mut self, provenance: Provenance) -> &mut HashMap<String, JobRecord> {
        match provenance {
            Provenance::Native => &mut self.native,
            Provenance::Guest => &mut self.guest,
        }
    }
}

fn created_key(record: &JobRecord) -> DateTime<Utc> {
    record.created_at.unwrap_or(DateTime::UNIX_EPOCH)
}
