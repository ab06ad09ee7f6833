use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

macro_rules! metrics {
    ($($name:ident),* $(,)?) => {
        /// Process-wide counters and gauges, created once at start-up and
        /// shared by every pipeline stage.
        #[derive(Debug, Default)]
        pub struct Metrics {
            $(pub $name: AtomicU64,)*
        }

        #[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
        pub struct Snapshot {
            $(pub $name: u64,)*
        }

        impl Metrics {
            pub fn snapshot(&self) -> Snapshot {
                Snapshot {
                    $($name: self.$name.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

metrics! {
    received,
    malformed,
    producer_drops,
    stalls,
    updates,
    evicted_idle,
    evicted_active,
    evicted_capacity,
    evicted_drain,
    overflow,
    forwarded,
    duplicates,
    untracked,
    batches,
    batches_lost,
    timeouts,
    failures,
    exported,
    lost,
    cache_size,
    dedup_size,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn merge_producer_drops(&self, n: u64) {
        add(&self.producer_drops, n);
    }
}

pub fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

pub fn set(gauge: &AtomicU64, n: u64) {
    gauge.store(n, Ordering::Relaxed);
}
