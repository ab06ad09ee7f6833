use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, trace};
use crate::flow::{FlowKey, FlowRecord, Reason, Timestamp};
use crate::metrics::{self, Metrics};

#[derive(Clone, Debug)]
pub struct Config {
    pub capacity: usize,
    pub idle:     Duration,
    pub active:   Duration,
    pub burst:    usize,
}

/// Accounting table of live flows. Eviction victims are chosen by exact
/// oldest last-seen, ties broken by admission order.
pub struct FlowCache {
    flows:   HashMap<FlowKey, Entry>,
    by_last: BTreeMap<(Timestamp, u64), FlowKey>,
    by_born: BTreeMap<(Timestamp, u64), FlowKey>,
    seq:     u64,
    budget:  usize,
    cfg:     Config,
    metrics: Arc<Metrics>,
}

struct Entry {
    seq:    u64,
    record: FlowRecord,
}

impl FlowCache {
    pub fn new(cfg: Config, metrics: Arc<Metrics>) -> Self {
        Self {
            flows:   HashMap::with_capacity(cfg.capacity.min(1 << 16)),
            by_last: BTreeMap::new(),
            by_born: BTreeMap::new(),
            seq:     0,
            budget:  cfg.burst,
            cfg:     cfg,
            metrics: metrics,
        }
    }

    /// Merge `delta` into its flow. Returns a record displaced from the
    /// cache path: the capacity victim, or `delta` itself flagged as
    /// overflow when no slot could be freed.
    pub fn update(&mut self, delta: FlowRecord) -> Option<FlowRecord> {
        metrics::inc(&self.metrics.updates);

        if let Some(entry) = self.flows.get_mut(&delta.key) {
            let seq  = entry.seq;
            let last = entry.record.last_seen;
            let born = entry.record.first_seen;

            entry.record.merge(&delta);

            if entry.record.last_seen != last {
                self.by_last.remove(&(last, seq));
                self.by_last.insert((entry.record.last_seen, seq), delta.key);
            }

            if entry.record.first_seen != born {
                self.by_born.remove(&(born, seq));
                self.by_born.insert((entry.record.first_seen, seq), delta.key);
            }

            return None;
        }

        let mut victim = None;

        if self.flows.len() >= self.cfg.capacity {
            if self.budget == 0 || self.flows.is_empty() {
                return Some(self.overflow(delta));
            }
            victim = self.pop_oldest();
            self.budget -= 1;
            metrics::inc(&self.metrics.evicted_capacity);
        }

        self.insert(delta);

        victim
    }

    /// Remove flows idle beyond the idle timeout or alive beyond the
    /// active timeout, and refill the capacity eviction budget.
    pub fn evict(&mut self, now: Timestamp) -> Vec<FlowRecord> {
        let mut evicted = Vec::new();

        let idle = expired(&self.by_last, now, self.cfg.idle);
        for key in idle {
            if let Some(rec) = self.remove(&key) {
                metrics::inc(&self.metrics.evicted_idle);
                evicted.push(rec);
            }
        }

        let active = expired(&self.by_born, now, self.cfg.active);
        for key in active {
            if let Some(rec) = self.remove(&key) {
                metrics::inc(&self.metrics.evicted_active);
                evicted.push(rec);
            }
        }

        self.budget = self.cfg.burst;

        if !evicted.is_empty() {
            debug!("evicted {} flows, {} live", evicted.len(), self.flows.len());
        }

        evicted
    }

    /// Force-evict every live flow.
    pub fn drain(&mut self) -> Vec<FlowRecord> {
        let drained = self.by_last.values().copied().collect::<Vec<_>>();
        let drained = drained.iter().flat_map(|key| self.remove(key)).collect::<Vec<_>>();
        metrics::add(&self.metrics.evicted_drain, drained.len() as u64);
        drained
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cfg.capacity
    }

    pub fn get(&self, key: &FlowKey) -> Option<&FlowRecord> {
        self.flows.get(key).map(|e| &e.record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowRecord> {
        self.by_last.values().flat_map(move |key| self.get(key))
    }

    fn insert(&mut self, record: FlowRecord) {
        let seq = self.seq;
        self.seq += 1;

        self.by_last.insert((record.last_seen, seq), record.key);
        self.by_born.insert((record.first_seen, seq), record.key);
        self.flows.insert(record.key, Entry { seq, record });

        metrics::set(&self.metrics.cache_size, self.flows.len() as u64);
    }

    fn remove(&mut self, key: &FlowKey) -> Option<FlowRecord> {
        let Entry { seq, record } = self.flows.remove(key)?;

        self.by_last.remove(&(record.last_seen, seq));
        self.by_born.remove(&(record.first_seen, seq));

        metrics::set(&self.metrics.cache_size, self.flows.len() as u64);

        Some(record)
    }

    fn pop_oldest(&mut self) -> Option<FlowRecord> {
        let key = self.by_last.values().next().copied()?;
        trace!("capacity eviction of {}", key);
        self.remove(&key)
    }

    fn overflow(&self, mut delta: FlowRecord) -> FlowRecord {
        trace!("cache full, bypassing {}", delta.key);
        metrics::inc(&self.metrics.overflow);
        delta.reason = Some(Reason::Overflow);
        delta
    }
}

fn expired(index: &BTreeMap<(Timestamp, u64), FlowKey>, now: Timestamp, timeout: Duration) -> Vec<FlowKey> {
    index.iter().take_while(|((ts, _), _)| {
        now.since(*ts) > timeout
    }).map(|(_, key)| *key).collect()
}
