//! In-process [`RemoteStore`] backed by channels.
//!
//! Collections are plain document vectors. Writing a collection pushes a
//! fresh snapshot to every subscriber whose query targets it, and errors can
//! be injected on the push or fetch path to simulate a flaky transport.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use liveops_core::timestamp::parse_instant;

use crate::error::StoreError;
use crate::store::{Direction, Document, Query, RemoteStore, SnapshotEvent, Subscription, Unsubscribe};

struct Subscriber {
    id: u64,
    query: Query,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    fetch_failures: HashMap<String, VecDeque<StoreError>>,
    rejected: HashMap<String, StoreError>,
    fetch_count: usize,
}

impl Inner {
    /// Push the current contents of `collection` to its subscribers.
    fn broadcast(&mut self, collection: &str) {
        let docs = self.collections.get(collection).cloned().unwrap_or_default();
        self.subscribers.retain(|sub| {
            if sub.query.collection != collection {
                return true;
            }
            sub.tx.send(Ok(apply_query(&sub.query, &docs))).is_ok()
        });
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection and notify its subscribers.
    pub fn set_collection(&self, collection: &str, docs: Vec<Document>) {
        let mut inner = lock(&self.inner);
        inner.collections.insert(collection.to_string(), docs);
        inner.broadcast(collection);
    }

    /// Replace a collection without notifying anyone, as if the push
    /// transport were down while the data changed.
    pub fn write_silently(&self, collection: &str, docs: Vec<Document>) {
        lock(&self.inner)
            .collections
            .insert(collection.to_string(), docs);
    }

    /// Insert or replace one document by id and notify subscribers.
    pub fn upsert(&self, collection: &str, doc: Document) {
        let mut inner = lock(&self.inner);
        let docs = inner.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        inner.broadcast(collection);
    }

    /// Remove one document by id and notify subscribers.
    pub fn remove(&self, collection: &str, id: &str) {
        let mut inner = lock(&self.inner);
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        inner.broadcast(collection);
    }

    /// Deliver an error to every subscriber of `collection`.
    pub fn push_error(&self, collection: &str, error: StoreError) {
        let mut inner = lock(&self.inner);
        inner.subscribers.retain(|sub| {
            if sub.query.collection != collection {
                return true;
            }
            sub.tx.send(Err(error.clone())).is_ok()
        });
    }

    /// Make the next fetch against `collection` fail with `error`.
    pub fn fail_next_fetch(&self, collection: &str, error: StoreError) {
        lock(&self.inner)
            .fetch_failures
            .entry(collection.to_string())
            .or_default()
            .push_back(error);
    }

    /// Refuse all future subscriptions to `collection`.
    pub fn reject_subscriptions(&self, collection: &str, error: StoreError) {
        lock(&self.inner)
            .rejected
            .insert(collection.to_string(), error);
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.inner)
            .subscribers
            .iter()
            .filter(|sub| !sub.tx.is_closed())
            .count()
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.inner).fetch_count
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError> {
        query.validate()?;
        let mut inner = lock(&self.inner);
        if let Some(error) = inner.rejected.get(&query.collection) {
            return Err(error.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        // Seeded collections deliver their current state immediately.
        if let Some(docs) = inner.collections.get(&query.collection) {
            let _ = tx.send(Ok(apply_query(query, docs)));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            query: query.clone(),
            tx,
        });
        debug!(subscriber = id, query = %query, "memory store subscription opened");

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let unsubscribe = Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).subscribers.retain(|sub| sub.id != id);
                debug!(subscriber = id, "memory store subscription closed");
            }
        });
        Ok(Subscription::new(rx, unsubscribe))
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        query.validate()?;
        let mut inner = lock(&self.inner);
        inner.fetch_count += 1;
        if let Some(error) = inner
            .fetch_failures
            .get_mut(&query.collection)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        let docs = inner
            .collections
            .get(&query.collection)
            .map(|docs| apply_query(query, docs))
            .unwrap_or_default();
        Ok(docs)
    }
}

/// Evaluate filters, ordering and limit against a document list.
pub fn apply_query(query: &Query, docs: &[Document]) -> Vec<Document> {
    let mut matched: Vec<Document> = docs
        .iter()
        .filter(|doc| {
            query
                .filters
                .iter()
                .all(|f| doc.data.get(&f.field) == Some(&f.value))
        })
        .cloned()
        .collect();

    if let Some(order) = &query.order_by {
        matched.sort_by(|a, b| {
            let ord = compare_fields(a.data.get(&order.field), b.data.get(&order.field));
            match order.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }

    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
}

/// Instants compare chronologically, numbers numerically, strings
/// lexically; missing values sort lowest.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (parse_instant(a), parse_instant(b)) {
                return x.cmp(&y);
            }
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => Ordering::Equal,
            }
        }
    }
}
