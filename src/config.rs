use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::Result;
use log::warn;
use serde::{Serialize, Deserialize, Deserializer};
use crate::cache;
use crate::dedup::{self, Strategy};
use crate::trace;

/// Agent settings as read from the JSON config file. Every field has a
/// default and `sanitize` replaces unusable values instead of failing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen:  String,
    pub channel: usize,
    pub poll_ms: u64,
    pub cache:   CacheConfig,
    pub dedup:   DedupConfig,
    pub export:  ExportConfig,
    pub augment: AugmentConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_flows:         usize,
    pub idle_timeout_ms:   u64,
    pub active_timeout_ms: u64,
    pub eviction_burst:    usize,
    pub evict_interval_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    #[serde(deserialize_with = "strategy")]
    pub strategy:    Strategy,
    pub expiry_ms:   Option<u64>,
    pub max_entries: usize,
    pub bucket_ms:   u64,
    pub mark:        bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub batch_max:         usize,
    pub flush_interval_ms: u64,
    pub send_timeout_ms:   u64,
    pub sinks:             Vec<SinkConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub file:   Option<String>,
    pub listen: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    Stdout,
    Tcp { addr: String },
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Replace invalid values with their defaults, logging each one.
    pub fn sanitize(mut self) -> Self {
        let d = Config::default();

        fallback(&mut self.channel, d.channel, "channel", |n| *n > 0);
        fallback(&mut self.poll_ms, d.poll_ms, "poll_ms", |n| *n > 0);

        let (c, dc) = (&mut self.cache, &d.cache);
        fallback(&mut c.idle_timeout_ms,   dc.idle_timeout_ms,   "cache.idle_timeout_ms",   |n| *n > 0);
        fallback(&mut c.active_timeout_ms, dc.active_timeout_ms, "cache.active_timeout_ms", |n| *n > 0);
        if let Some(ms) = c.evict_interval_ms.filter(|ms| *ms == 0) {
            warn!("invalid cache.evict_interval_ms {}, using default", ms);
            c.evict_interval_ms = None;
        }

        let (x, dx) = (&mut self.dedup, &d.dedup);
        if let Some(ms) = x.expiry_ms.filter(|ms| *ms == 0) {
            warn!("invalid dedup.expiry_ms {}, using default", ms);
            x.expiry_ms = None;
        }
        fallback(&mut x.max_entries, dx.max_entries, "dedup.max_entries", |n| *n > 0);
        fallback(&mut x.bucket_ms,   dx.bucket_ms,   "dedup.bucket_ms",   |n| *n > 0);

        let (e, de) = (&mut self.export, &d.export);
        fallback(&mut e.batch_max,         de.batch_max,         "export.batch_max",         |n| *n > 0);
        fallback(&mut e.flush_interval_ms, de.flush_interval_ms, "export.flush_interval_ms", |n| *n > 0);
        fallback(&mut e.send_timeout_ms,   de.send_timeout_ms,   "export.send_timeout_ms",   |n| *n > 0);
        if e.sinks.is_empty() {
            warn!("no sinks configured, using stdout");
            e.sinks = de.sinks.clone();
        }

        self
    }

    pub fn tracer(&self) -> trace::Config {
        let idle   = Duration::from_millis(self.cache.idle_timeout_ms);
        let active = Duration::from_millis(self.cache.active_timeout_ms);

        let evict = match self.cache.evict_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None     => idle.min(active) / 2,
        };

        let expiry = match self.dedup.expiry_ms {
            Some(ms) => Duration::from_millis(ms),
            None     => idle,
        };

        trace::Config {
            cache: cache::Config {
                capacity: self.cache.max_flows,
                idle:     idle,
                active:   active,
                burst:    self.cache.eviction_burst,
            },
            dedup: dedup::Config {
                strategy: self.dedup.strategy,
                expiry:   expiry,
                capacity: self.dedup.max_entries,
                bucket:   Duration::from_millis(self.dedup.bucket_ms),
                mark:     self.dedup.mark,
            },
            poll:      Duration::from_millis(self.poll_ms),
            evict:     evict,
            flush:     Duration::from_millis(self.export.flush_interval_ms),
            batch_max: self.export.batch_max,
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.export.send_timeout_ms)
    }
}

fn fallback<T: Copy + std::fmt::Display>(v: &mut T, default: T, name: &str, valid: impl Fn(&T) -> bool) {
    if !valid(v) {
        warn!("invalid {} {}, using {}", name, v, default);
        *v = default;
    }
}

fn strategy<'de, D: Deserializer<'de>>(d: D) -> Result<Strategy, D::Error> {
    let name = String::deserialize(d)?;
    Ok(name.parse().unwrap_or_else(|e| {
        warn!("{}, using first-come", e);
        Strategy::FirstCome
    }))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen:  "127.0.0.1:7171".to_owned(),
            channel: 10_000,
            poll_ms: 50,
            cache:   CacheConfig::default(),
            dedup:   DedupConfig::default(),
            export:  ExportConfig::default(),
            augment: AugmentConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_flows:         5_000,
            idle_timeout_ms:   10_000,
            active_timeout_ms: 60_000,
            eviction_burst:    1_024,
            evict_interval_ms: None,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            strategy:    Strategy::FirstCome,
            expiry_ms:   None,
            max_entries: 50_000,
            bucket_ms:   60_000,
            mark:        false,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_max:         1_000,
            flush_interval_ms: 5_000,
            send_timeout_ms:   5_000,
            sinks:             vec![SinkConfig::Stdout],
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;
    use anyhow::Result;
    use crate::dedup::Strategy;
    use super::{Config, SinkConfig};

    #[test]
    fn defaults() -> Result<()> {
        let cfg: Config = serde_json::from_str("{}")?;
        assert_eq!(cfg, Config::default());

        let t = cfg.tracer();
        assert_eq!(t.cache.capacity, 5_000);
        assert_eq!(t.evict,          Duration::from_secs(5));
        assert_eq!(t.dedup.expiry,   Duration::from_secs(10));
        assert_eq!(t.dedup.strategy, Strategy::FirstCome);
        assert_eq!(t.batch_max,      1_000);

        Ok(())
    }

    #[test]
    fn partial_file() -> Result<()> {
        let cfg: Config = serde_json::from_str(r#"{
            "cache":  { "max_flows": 64, "idle_timeout_ms": 2000 },
            "dedup":  { "strategy": "last-come", "mark": true },
            "export": { "sinks": [{ "kind": "tcp", "addr": "10.0.0.1:9000" }, { "kind": "stdout" }] }
        }"#)?;

        assert_eq!(cfg.cache.max_flows,         64);
        assert_eq!(cfg.cache.active_timeout_ms, 60_000);
        assert_eq!(cfg.dedup.strategy,          Strategy::LastCome);
        assert_eq!(cfg.export.sinks, vec![
            SinkConfig::Tcp { addr: "10.0.0.1:9000".to_owned() },
            SinkConfig::Stdout,
        ]);

        let t = cfg.tracer();
        assert_eq!(t.evict,        Duration::from_secs(1));
        assert_eq!(t.dedup.expiry, Duration::from_secs(2));
        assert!(t.dedup.mark);

        Ok(())
    }

    #[test]
    fn invalid_values_fall_back() -> Result<()> {
        let cfg: Config = serde_json::from_str(r#"{
            "channel": 0,
            "cache":  { "idle_timeout_ms": 0, "evict_interval_ms": 0 },
            "dedup":  { "expiry_ms": 0, "bucket_ms": 0 },
            "export": { "batch_max": 0, "send_timeout_ms": 0, "sinks": [] }
        }"#)?;

        assert_eq!(cfg.sanitize(), Config::default());

        Ok(())
    }

    #[test]
    fn unknown_strategy_falls_back() -> Result<()> {
        let cfg: Config = serde_json::from_str(r#"{ "dedup": { "strategy": "random" } }"#)?;
        assert_eq!(cfg.dedup.strategy, Strategy::FirstCome);
        Ok(())
    }
}
