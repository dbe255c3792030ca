//! Remote store abstraction.
//!
//! The live-ops engine never talks to a concrete backend. It is handed an
//! `Arc<dyn RemoteStore>` that can open push subscriptions and perform
//! one-shot fetches; [`crate::memory::MemoryStore`] implements it in-process.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// A raw document as delivered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction: Direction::Descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject queries the store would refuse anyway.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.collection.trim().is_empty() {
            return Err(StoreError::invalid_argument("query has no collection"));
        }
        if self.limit == Some(0) {
            return Err(StoreError::invalid_argument(format!(
                "query on '{}' has a zero limit",
                self.collection
            )));
        }
        if self.filters.iter().any(|f| f.field.is_empty()) {
            return Err(StoreError::invalid_argument(format!(
                "query on '{}' filters on an empty field name",
                self.collection
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        for filter in &self.filters {
            write!(f, " where {} == {}", filter.field, filter.value)?;
        }
        if let Some(order) = &self.order_by {
            let dir = match order.direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            write!(f, " order by {} {}", order.field, dir)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }
        Ok(())
    }
}

/// One delivery from a push subscription: a full snapshot or an error.
pub type SnapshotEvent = Result<Vec<Document>, StoreError>;

/// Idempotent cancel hook returned by the store.
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send + 'static>>);

impl Unsubscribe {
    pub fn new(hook: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(hook)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    /// Run the hook. Later calls do nothing.
    pub fn run(&mut self) {
        if let Some(hook) = self.0.take() {
            hook();
        }
    }

    fn is_spent(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unsubscribe")
            .field(&if self.is_spent() { "spent" } else { "armed" })
            .finish()
    }
}

/// A live push subscription: an event channel plus its cancel hook.
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<SnapshotEvent>,
    pub unsubscribe: Unsubscribe,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<SnapshotEvent>, unsubscribe: Unsubscribe) -> Self {
        Self {
            events,
            unsubscribe,
        }
    }
}

/// Trait for backing store clients.
///
/// Implementations deliver snapshots at-least-once and report transport
/// failures as [`StoreError`]s on the subscription channel.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a push subscription. Fails synchronously on malformed queries.
    fn subscribe(&self, query: &Query) -> Result<Subscription, StoreError>;

    /// One-shot fetch of the documents matching `query`.
    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError>;
}
