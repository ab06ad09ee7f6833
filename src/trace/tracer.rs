use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, trace, warn};
use tokio_util::sync::CancellationToken;
use crate::augment::Enrich;
use crate::cache::{self, FlowCache};
use crate::dedup::{self, Decision, Dedup};
use crate::error::Error;
use crate::export::Router;
use crate::flow::{decode, FlowRecord, Timestamp};
use crate::metrics::{self, Metrics};
use super::{Clock, Tick};

#[derive(Clone, Debug)]
pub struct Config {
    pub cache:     cache::Config,
    pub dedup:     dedup::Config,
    pub poll:      Duration,
    pub evict:     Duration,
    pub flush:     Duration,
    pub batch_max: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Single-writer consumer of the producer channel. Owns the accounting
/// cache and the dedup table; nothing else touches them.
pub struct Tracer<C: Clock> {
    cfg:     Config,
    rx:      Receiver<Vec<u8>>,
    cache:   FlowCache,
    dedup:   Dedup,
    router:  Router,
    enrich:  Arc<dyn Enrich>,
    metrics: Arc<Metrics>,
    cancel:  CancellationToken,
    clock:   C,
    dump:    Arc<AtomicBool>,
    batch:   Vec<FlowRecord>,
    state:   State,
}

impl<C: Clock> Tracer<C> {
    pub fn new(
        cfg:     Config,
        rx:      Receiver<Vec<u8>>,
        router:  Router,
        enrich:  Arc<dyn Enrich>,
        metrics: Arc<Metrics>,
        cancel:  CancellationToken,
        clock:   C,
    ) -> Self {
        let cache = FlowCache::new(cfg.cache.clone(), metrics.clone());
        let dedup = Dedup::new(cfg.dedup.clone(), metrics.clone());

        Self {
            batch:   Vec::with_capacity(cfg.batch_max),
            cfg:     cfg,
            rx:      rx,
            cache:   cache,
            dedup:   dedup,
            router:  router,
            enrich:  enrich,
            metrics: metrics,
            cancel:  cancel,
            clock:   clock,
            dump:    Arc::new(AtomicBool::new(false)),
            state:   State::Idle,
        }
    }

    /// Flag that requests a log dump of live flows and counters at the
    /// next eviction tick.
    pub fn dump(&self) -> Arc<AtomicBool> {
        self.dump.clone()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Consume records until cancelled or the producer goes away, then
    /// drain every live flow. A vanished producer is reported as an
    /// error once draining has completed.
    pub fn run(&mut self) -> Result<()> {
        let now = self.clock.now();

        let mut evict = Tick::start(self.cfg.evict, now);
        let mut flush = Tick::start(self.cfg.flush, now);
        let mut closed = false;

        self.state = State::Running;
        info!("tracer running, cache capacity {}", self.cache.capacity());

        while self.state == State::Running {
            match self.rx.recv_timeout(self.cfg.poll) {
                Ok(raw) => self.record(&raw),
                Err(RecvTimeoutError::Timeout) => {
                    trace!("producer idle for {:?}", self.cfg.poll);
                    metrics::inc(&self.metrics.stalls);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("producer channel closed");
                    closed = true;
                    self.state = State::Draining;
                }
            }

            if self.cancel.is_cancelled() {
                debug!("tracer cancelled");
                self.state = State::Draining;
            }

            let now = self.clock.now();

            if evict.due(now) {
                self.tick(now);
            }

            if flush.due(now) {
                self.flush();
            }
        }

        self.drain();

        match closed {
            true  => Err(Error::Closed.into()),
            false => Ok(()),
        }
    }

    fn record(&mut self, raw: &[u8]) {
        metrics::inc(&self.metrics.received);

        let delta = match decode(raw) {
            Ok(delta) => delta,
            Err(e)    => {
                debug!("skipping record: {}", e);
                metrics::inc(&self.metrics.malformed);
                return;
            }
        };

        if let Some(displaced) = self.cache.update(delta) {
            let now = self.clock.now();
            self.forward(displaced, now);
        }
    }

    fn tick(&mut self, now: Timestamp) {
        for rec in self.cache.evict(now) {
            self.forward(rec, now);
        }

        for rec in self.dedup.sweep(now) {
            self.push(rec);
        }

        if self.dump.swap(false, Ordering::AcqRel) {
            self.log_state();
        }

        self.flush();
    }

    fn forward(&mut self, rec: FlowRecord, now: Timestamp) {
        let fp = self.dedup.fingerprint(&rec);
        match self.dedup.decide(fp, rec, now) {
            Decision::Forward(rec)              => self.push(rec),
            Decision::Suppress | Decision::Hold => (),
        }
    }

    fn push(&mut self, rec: FlowRecord) {
        self.batch.push(rec);
        if self.batch.len() >= self.cfg.batch_max {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let mut batch = Vec::with_capacity(self.cfg.batch_max);
        mem::swap(&mut self.batch, &mut batch);

        self.enrich.merge(&mut batch);

        let count   = batch.len();
        let outcome = self.router.export(batch);
        trace!("flushed {} flows: {:?}", count, outcome);
    }

    fn drain(&mut self) {
        self.state = State::Draining;

        while let Ok(raw) = self.rx.try_recv() {
            self.record(&raw);
        }

        let now = self.clock.now();

        let drained = self.cache.drain();
        info!("draining {} live flows", drained.len());

        for rec in drained {
            self.forward(rec, now);
        }

        for rec in self.dedup.flush() {
            self.push(rec);
        }

        self.flush();
        self.log_state();

        self.state = State::Stopped;
    }

    fn log_state(&self) {
        for rec in self.cache.iter() {
            info!("live {} packets {} bytes {}", rec.key, rec.packets, rec.bytes);
        }

        match serde_json::to_string(&self.metrics.snapshot()) {
            Ok(json) => info!("metrics {}", json),
            Err(e)   => warn!("metrics snapshot failed: {}", e),
        }
    }
}
