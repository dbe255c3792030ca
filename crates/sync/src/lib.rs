//! Real-time synchronization for the live-ops dashboard.
//!
//! Three push subscriptions (jobs, guest bookings, employees) feed a merged,
//! provenance-tagged record set. Repeated failures on the jobs stream switch
//! the engine to interval polling until push delivery recovers. Consumers
//! read derived snapshots through [`LiveOps`].

pub mod debounce;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod memory;
pub mod merger;
pub mod options;
pub mod polling;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod state;
pub mod store;
pub mod subscription;

pub use debounce::SearchDebouncer;
pub use engine::{LiveOps, LiveOpsSnapshot};
pub use error::{ErrorCode, SetupError, StoreError};
pub use escalation::{ErrorEscalationTracker, Escalation};
pub use memory::MemoryStore;
pub use merger::RecordMerger;
pub use options::ViewOptions;
pub use polling::{PolledPage, PollingWorker};
pub use scheduler::DelayedTask;
pub use session::{Session, SessionUser};
pub use sink::EventSink;
pub use state::{ErrorNotice, Phase, Source, SourceStatus, SubscriptionState};
pub use store::{Document, Query, RemoteStore, Subscription, Unsubscribe};
pub use subscription::{SourceQueries, StreamSubscriptionManager, SubscriptionHandles};
