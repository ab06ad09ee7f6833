use std::collections::HashMap;
use std::mem;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, trace};
use serde::{Serialize, Deserialize};
use crate::flow::{Direction, FlowKey, FlowRecord, Timestamp};
use crate::metrics::{self, Metrics};
use super::Fingerprint;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    None,
    FirstCome,
    LastCome,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub strategy: Strategy,
    pub expiry:   Duration,
    pub capacity: usize,
    pub bucket:   Duration,
    pub mark:     bool,
}

#[derive(Debug, PartialEq)]
pub enum Decision {
    Forward(FlowRecord),
    Suppress,
    Hold,
}

pub struct Dedup {
    kind:    Kind,
    bucket:  Duration,
    metrics: Arc<Metrics>,
}

enum Kind {
    None,
    FirstCome(FirstCome),
    LastCome(LastCome),
}

struct FirstCome {
    seen:     HashMap<Fingerprint, Window>,
    expiry:   Duration,
    capacity: usize,
    mark:     bool,
}

struct LastCome {
    held:     HashMap<Fingerprint, Held>,
    ready:    Vec<FlowRecord>,
    expiry:   Duration,
    capacity: usize,
    mark:     bool,
}

/// Observation point that opened a window. Records from it are never
/// duplicates of each other, only of other vantages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Vantage {
    ifindex:   u32,
    direction: Direction,
}

struct Window {
    expires: Timestamp,
    owner:   Vantage,
}

struct Held {
    expires: Timestamp,
    owner:   Vantage,
    record:  FlowRecord,
}

impl Vantage {
    fn of(key: &FlowKey) -> Self {
        Self {
            ifindex:   key.ifindex,
            direction: key.direction,
        }
    }
}

impl Dedup {
    pub fn new(cfg: Config, metrics: Arc<Metrics>) -> Self {
        let Config { strategy, expiry, capacity, bucket, mark } = cfg;

        let kind = match strategy {
            Strategy::None      => Kind::None,
            Strategy::FirstCome => Kind::FirstCome(FirstCome {
                seen:     HashMap::new(),
                expiry:   expiry,
                capacity: capacity,
                mark:     mark,
            }),
            Strategy::LastCome  => Kind::LastCome(LastCome {
                held:     HashMap::new(),
                ready:    Vec::new(),
                expiry:   expiry,
                capacity: capacity,
                mark:     mark,
            }),
        };

        Self { kind, bucket, metrics }
    }

    pub fn fingerprint(&self, rec: &FlowRecord) -> Fingerprint {
        Fingerprint::of(rec, self.bucket)
    }

    pub fn decide(&mut self, fp: Fingerprint, rec: FlowRecord, now: Timestamp) -> Decision {
        let metrics  = &self.metrics;
        let decision = match &mut self.kind {
            Kind::None         => Decision::Forward(rec),
            Kind::FirstCome(t) => t.decide(fp, rec, now, metrics),
            Kind::LastCome(t)  => t.decide(fp, rec, now, metrics),
        };

        if let Decision::Forward(_) = decision {
            metrics::inc(&self.metrics.forwarded);
        }

        metrics::set(&self.metrics.dedup_size, self.len() as u64);

        decision
    }

    /// Forget expired fingerprints, returning held records whose window
    /// has elapsed.
    pub fn sweep(&mut self, now: Timestamp) -> Vec<FlowRecord> {
        let released = match &mut self.kind {
            Kind::None         => Vec::new(),
            Kind::FirstCome(t) => t.sweep(now),
            Kind::LastCome(t)  => t.sweep(now),
        };

        metrics::add(&self.metrics.forwarded, released.len() as u64);
        metrics::set(&self.metrics.dedup_size, self.len() as u64);

        released
    }

    /// Release every held record regardless of its window.
    pub fn flush(&mut self) -> Vec<FlowRecord> {
        let released = match &mut self.kind {
            Kind::None         => Vec::new(),
            Kind::FirstCome(t) => {
                t.seen.clear();
                Vec::new()
            }
            Kind::LastCome(t)  => {
                let mut rs = mem::take(&mut t.ready);
                rs.extend(t.held.drain().map(|(_, h)| h.record));
                rs
            }
        };

        metrics::add(&self.metrics.forwarded, released.len() as u64);
        metrics::set(&self.metrics.dedup_size, 0);

        released
    }

    pub fn len(&self) -> usize {
        match &self.kind {
            Kind::None         => 0,
            Kind::FirstCome(t) => t.seen.len(),
            Kind::LastCome(t)  => t.held.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FirstCome {
    fn decide(&mut self, fp: Fingerprint, mut rec: FlowRecord, now: Timestamp, metrics: &Metrics) -> Decision {
        let vantage = Vantage::of(&rec.key);

        match self.seen.get(&fp) {
            Some(w) if now < w.expires && w.owner == vantage => {
                return Decision::Forward(rec);
            }
            Some(w) if now < w.expires => {
                trace!("duplicate {}", rec.key);
                metrics::inc(&metrics.duplicates);
                return match self.mark {
                    true  => {
                        rec.duplicate = true;
                        Decision::Forward(rec)
                    }
                    false => Decision::Suppress,
                };
            }
            Some(_) => (),
            None    => {
                if self.seen.len() >= self.capacity {
                    self.sweep(now);
                }
                if self.seen.len() >= self.capacity {
                    metrics::inc(&metrics.untracked);
                    return Decision::Forward(rec);
                }
            }
        }

        self.seen.insert(fp, Window {
            expires: now + self.expiry,
            owner:   vantage,
        });

        Decision::Forward(rec)
    }

    fn sweep(&mut self, now: Timestamp) -> Vec<FlowRecord> {
        let before = self.seen.len();
        self.seen.retain(|_, w| now < w.expires);
        if before > self.seen.len() {
            debug!("forgot {} fingerprints", before - self.seen.len());
        }
        Vec::new()
    }
}

impl LastCome {
    fn decide(&mut self, fp: Fingerprint, mut rec: FlowRecord, now: Timestamp, metrics: &Metrics) -> Decision {
        let vantage = Vantage::of(&rec.key);

        if let Some(held) = self.held.get_mut(&fp) {
            if now < held.expires && held.owner == vantage {
                held.record.merge(&rec);
                return Decision::Hold;
            }

            if now < held.expires {
                trace!("duplicate {}", rec.key);
                metrics::inc(&metrics.duplicates);

                if rec.last_seen >= held.record.last_seen {
                    mem::swap(&mut held.record, &mut rec);
                    held.owner = vantage;
                }

                return match self.mark {
                    true  => {
                        rec.duplicate = true;
                        Decision::Forward(rec)
                    }
                    false => Decision::Hold,
                };
            }

            let expires = now + self.expiry;
            let old = mem::replace(held, Held { expires, owner: vantage, record: rec });
            self.ready.push(old.record);

            return Decision::Hold;
        }

        if self.held.len() >= self.capacity {
            let released = self.sweep(now);
            self.ready.extend(released);
        }

        if self.held.len() >= self.capacity {
            metrics::inc(&metrics.untracked);
            return Decision::Forward(rec);
        }

        let expires = now + self.expiry;
        self.held.insert(fp, Held { expires, owner: vantage, record: rec });

        Decision::Hold
    }

    fn sweep(&mut self, now: Timestamp) -> Vec<FlowRecord> {
        let mut released = mem::take(&mut self.ready);

        let expired = self.held.iter().filter(|(_, h)| now >= h.expires).map(|(fp, _)| {
            *fp
        }).collect::<Vec<_>>();

        for fp in expired {
            if let Some(held) = self.held.remove(&fp) {
                released.push(held.record);
            }
        }

        released
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none"       => Ok(Strategy::None),
            "first-come" => Ok(Strategy::FirstCome),
            "last-come"  => Ok(Strategy::LastCome),
            _            => Err(format!("invalid dedup strategy: {}", s)),
        }
    }
}
