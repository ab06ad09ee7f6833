use std::sync::Arc;
use futures::future::BoxFuture;
use crate::error::Error;
use crate::flow::FlowRecord;

pub type Batch = Arc<Vec<FlowRecord>>;

/// A collector client. Retry and backoff belong to the sink; the router
/// only bounds how long a single send may take.
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, batch: Batch) -> BoxFuture<'_, Result<(), Error>>;
}
