use std::time::Duration;
use anyhow::Result;
use crate::fixture::{key, record};
use crate::flow::{Reason, Timestamp};
use crate::flow::flow::{ACK, FIN, SYN};
use crate::metrics::Metrics;
use super::{Config, FlowCache};

fn cache(capacity: usize, idle: u64, active: u64) -> FlowCache {
    let cfg = Config {
        capacity: capacity,
        idle:     Duration::from_millis(idle),
        active:   Duration::from_millis(active),
        burst:    16,
    };
    FlowCache::new(cfg, Metrics::new())
}

#[test]
fn aggregate() -> Result<()> {
    let mut cache = cache(16, 1_000, 10_000);
    let k = key("10.0.0.1", 4000, "10.0.0.2", 80);

    assert!(cache.update(record(k, 0,   1, 60,   SYN)).is_none());
    assert!(cache.update(record(k, 10,  3, 4500, ACK)).is_none());
    assert!(cache.update(record(k, 20,  2, 120,  FIN | ACK)).is_none());

    let flows = cache.drain();
    assert_eq!(flows.len(), 1);

    let flow = &flows[0];
    assert_eq!(flow.packets,    6);
    assert_eq!(flow.bytes,      4680);
    assert_eq!(flow.tcp_flags,  SYN | ACK | FIN);
    assert_eq!(flow.first_seen, Timestamp::from_millis(0));
    assert_eq!(flow.last_seen,  Timestamp::from_millis(20));

    Ok(())
}

#[test]
fn merge_by_timestamp() -> Result<()> {
    let mut cache = cache(16, 1_000, 10_000);
    let k = key("10.0.0.1", 4000, "10.0.0.2", 80);

    let mut late = record(k, 50, 1, 100, 0);
    late.rtt  = Some(Duration::from_micros(300));
    late.dscp = 10;

    let mut early = record(k, 5, 1, 100, 0);
    early.rtt  = Some(Duration::from_micros(900));
    early.dscp = 46;

    cache.update(late);
    cache.update(early);

    let flow = cache.get(&k).cloned().expect("live flow");
    assert_eq!(flow.first_seen, Timestamp::from_millis(5));
    assert_eq!(flow.last_seen,  Timestamp::from_millis(50));
    assert_eq!(flow.rtt,        Some(Duration::from_micros(900)));
    assert_eq!(flow.dscp,       10);

    Ok(())
}

#[test]
fn capacity_victim() -> Result<()> {
    let mut cache = cache(2, 1_000, 10_000);
    let a = key("10.0.0.1", 1, "10.0.0.9", 80);
    let b = key("10.0.0.2", 2, "10.0.0.9", 80);
    let c = key("10.0.0.3", 3, "10.0.0.9", 80);

    assert!(cache.update(record(a, 0,  1, 100, 0)).is_none());
    assert!(cache.update(record(a, 5,  2, 200, 0)).is_none());
    assert!(cache.update(record(b, 10, 1, 100, 0)).is_none());

    let victim = cache.update(record(c, 20, 1, 100, 0)).expect("evicted");
    assert_eq!(victim.key,     a);
    assert_eq!(victim.packets, 3);
    assert_eq!(victim.bytes,   300);
    assert_eq!(victim.reason,  None);

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&b).is_some());
    assert!(cache.get(&c).is_some());

    Ok(())
}

#[test]
fn victim_is_oldest_last_seen() -> Result<()> {
    let mut cache = cache(2, 1_000, 10_000);
    let a = key("10.0.0.1", 1, "10.0.0.9", 80);
    let b = key("10.0.0.2", 2, "10.0.0.9", 80);
    let c = key("10.0.0.3", 3, "10.0.0.9", 80);

    cache.update(record(a, 0,  1, 100, 0));
    cache.update(record(b, 10, 1, 100, 0));
    cache.update(record(a, 30, 1, 100, 0));

    let victim = cache.update(record(c, 40, 1, 100, 0)).expect("evicted");
    assert_eq!(victim.key, b);

    Ok(())
}

#[test]
fn capacity_bound() -> Result<()> {
    let mut cache = cache(8, 1_000, 10_000);
    let mut displaced = 0;

    for n in 0..100u16 {
        let k = key("10.0.0.1", n, "10.0.0.2", 80);
        if cache.update(record(k, n as u64, 1, 64, 0)).is_some() {
            displaced += 1;
        }
        assert!(cache.len() <= cache.capacity());
    }

    assert_eq!(displaced + cache.len(), 100);

    Ok(())
}

#[test]
fn overflow_bypass() -> Result<()> {
    let cfg = Config {
        capacity: 2,
        idle:     Duration::from_secs(1),
        active:   Duration::from_secs(10),
        burst:    1,
    };
    let metrics   = Metrics::new();
    let mut cache = FlowCache::new(cfg, metrics.clone());

    let a = key("10.0.0.1", 1, "10.0.0.9", 80);
    let b = key("10.0.0.2", 2, "10.0.0.9", 80);
    let c = key("10.0.0.3", 3, "10.0.0.9", 80);
    let d = key("10.0.0.4", 4, "10.0.0.9", 80);

    cache.update(record(a, 0, 1, 100, 0));
    cache.update(record(b, 1, 1, 100, 0));

    let victim = cache.update(record(c, 2, 1, 100, 0)).expect("victim");
    assert_eq!(victim.key,    a);
    assert_eq!(victim.reason, None);

    let bypass = cache.update(record(d, 3, 1, 100, 0)).expect("bypass");
    assert_eq!(bypass.key,     d);
    assert_eq!(bypass.packets, 1);
    assert_eq!(bypass.reason,  Some(Reason::Overflow));
    assert_eq!(cache.len(), 2);

    let snap = metrics.snapshot();
    assert_eq!(snap.overflow,         1);
    assert_eq!(snap.evicted_capacity, 1);

    cache.evict(Timestamp::from_millis(4));
    assert!(cache.update(record(d, 5, 1, 100, 0)).is_some());
    assert!(cache.get(&d).is_some());

    Ok(())
}

#[test]
fn zero_capacity() -> Result<()> {
    let mut cache = cache(0, 1_000, 10_000);
    let k = key("10.0.0.1", 1, "10.0.0.9", 80);

    let rec = cache.update(record(k, 0, 1, 100, 0)).expect("bypass");
    assert_eq!(rec.reason, Some(Reason::Overflow));
    assert!(cache.is_empty());

    Ok(())
}

#[test]
fn idle_and_active_eviction() -> Result<()> {
    let mut cache = cache(16, 1_000, 5_000);
    let quiet = key("10.0.0.1", 1, "10.0.0.9", 80);
    let busy  = key("10.0.0.2", 2, "10.0.0.9", 80);

    cache.update(record(quiet, 0, 1, 100, 0));
    for ms in (0..=4_800).step_by(400) {
        cache.update(record(busy, ms, 1, 100, 0));
    }

    let evicted = cache.evict(Timestamp::from_millis(1_500));
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].key, quiet);

    assert!(cache.evict(Timestamp::from_millis(4_900)).is_empty());

    let evicted = cache.evict(Timestamp::from_millis(5_200));
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].key,     busy);
    assert_eq!(evicted[0].packets, 13);
    assert!(cache.is_empty());

    Ok(())
}

#[test]
fn drain_everything() -> Result<()> {
    let mut cache = cache(64, 1_000, 10_000);

    for n in 0..10u16 {
        let k = key("10.0.0.1", n, "10.0.0.2", 443);
        cache.update(record(k, 0, 1, 64, 0));
    }

    let mut ports = cache.drain().into_iter().map(|f| f.key.sport).collect::<Vec<_>>();
    ports.sort();

    assert_eq!(ports, (0..10).collect::<Vec<_>>());
    assert!(cache.is_empty());
    assert!(cache.evict(Timestamp::from_millis(100_000)).is_empty());

    Ok(())
}
