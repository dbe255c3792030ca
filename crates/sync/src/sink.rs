use crate::error::StoreError;
use crate::polling::PolledPage;
use crate::state::Source;
use crate::store::Document;

/// Receiver for everything the subscription and polling tasks produce.
///
/// Every call carries the generation of the cycle that produced it; the
/// implementation decides whether it is still current.
pub trait EventSink: Send + Sync + 'static {
    fn on_snapshot(&self, generation: u64, source: Source, docs: Vec<Document>);

    fn on_error(&self, generation: u64, source: Source, error: StoreError);

    /// Returns whether the polling loop should continue.
    fn on_poll(&self, generation: u64, result: Result<PolledPage, StoreError>) -> bool;
}
