use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::time::timeout;
use crate::flow::FlowRecord;
use crate::metrics::{self, Metrics};
use super::Sink;

pub struct Router {
    sinks:   Vec<Box<dyn Sink>>,
    timeout: Duration,
    handle:  Handle,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub struct Outcome {
    pub sent:      usize,
    pub failed:    usize,
    pub timed_out: usize,
}

impl Router {
    pub fn new(handle: Handle, sinks: Vec<Box<dyn Sink>>, timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self { sinks, timeout, handle, metrics }
    }

    /// Send one batch to every sink concurrently. Each send is bounded by
    /// the router timeout; failed or timed out sends are counted as lost
    /// and never retried here.
    pub fn export(&self, records: Vec<FlowRecord>) -> Outcome {
        let mut outcome = Outcome::default();

        if records.is_empty() {
            return outcome;
        }

        let count = records.len() as u64;
        let batch = Arc::new(records);
        let limit = self.timeout;

        let sends = self.sinks.iter().map(|sink| {
            let batch = batch.clone();
            async move {
                (sink.name(), timeout(limit, sink.send(batch)).await)
            }
        });

        let results = self.handle.block_on(join_all(sends));

        for (name, result) in results {
            match result {
                Ok(Ok(())) => {
                    outcome.sent += 1;
                    metrics::add(&self.metrics.exported, count);
                }
                Ok(Err(e)) => {
                    warn!("sink {} failed: {}", name, e);
                    outcome.failed += 1;
                    metrics::inc(&self.metrics.failures);
                }
                Err(_) => {
                    warn!("sink {} timed out after {:?}", name, limit);
                    outcome.timed_out += 1;
                    metrics::inc(&self.metrics.timeouts);
                }
            }
        }

        metrics::inc(&self.metrics.batches);

        let lost = outcome.failed + outcome.timed_out;
        if lost > 0 {
            metrics::inc(&self.metrics.batches_lost);
            metrics::add(&self.metrics.lost, count * lost as u64);
        }

        debug!("exported {} flows to {}/{} sinks", count, outcome.sent, self.sinks.len());

        outcome
    }
}
