use std::cmp::{max, min};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::Add;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::augment::Meta;

pub const FIN: u16 = 0b000001;
pub const SYN: u16 = 0b000010;
pub const ACK: u16 = 0b010000;

pub const TCP: u8 = 6;
pub const UDP: u8 = 17;

/// Nanoseconds on the monotonic clock shared with the kernel producer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ingress,
    Egress,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub src:       IpAddr,
    pub dst:       IpAddr,
    pub sport:     u16,
    pub dport:     u16,
    pub proto:     u8,
    pub ifindex:   u32,
    pub direction: Direction,
    pub vlan:      Option<u16>,
    pub icmp_type: u8,
    pub icmp_code: u8,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dns {
    pub id:      u16,
    pub flags:   u16,
    pub latency: Duration,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Drops {
    pub packets: u32,
    pub bytes:   u64,
    pub cause:   u16,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Reason {
    Overflow,
    Dropped,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub key:        FlowKey,
    pub first_seen: Timestamp,
    pub last_seen:  Timestamp,
    pub packets:    u64,
    pub bytes:      u64,
    pub tcp_flags:  u16,
    pub dscp:       u8,
    pub errno:      u8,
    pub rtt:        Option<Duration>,
    pub dns:        Option<Dns>,
    pub drops:      Option<Drops>,
    pub reason:     Option<Reason>,
    pub duplicate:  bool,
    pub meta:       Option<Meta>,
}

impl FlowRecord {
    pub fn new(key: FlowKey, ts: Timestamp) -> Self {
        Self {
            key:        key,
            first_seen: ts,
            last_seen:  ts,
            packets:    0,
            bytes:      0,
            tcp_flags:  0,
            dscp:       0,
            errno:      0,
            rtt:        None,
            dns:        None,
            drops:      None,
            reason:     None,
            duplicate:  false,
            meta:       None,
        }
    }

    pub fn merge(&mut self, delta: &FlowRecord) {
        let newer = delta.last_seen >= self.last_seen;

        self.packets    = self.packets.saturating_add(delta.packets);
        self.bytes      = self.bytes.saturating_add(delta.bytes);
        self.tcp_flags |= delta.tcp_flags;
        self.first_seen = min(self.first_seen, delta.first_seen);
        self.last_seen  = max(self.last_seen,  delta.last_seen);

        self.rtt = match (self.rtt, delta.rtt) {
            (Some(a), Some(b)) => Some(max(a, b)),
            (a, b)             => a.or(b),
        };

        self.dns = match (self.dns, delta.dns) {
            (Some(a), Some(b)) if b.latency > a.latency => Some(b),
            (a, b)                                      => a.or(b),
        };

        self.drops = match (self.drops, delta.drops) {
            (Some(a), Some(b)) => Some(Drops {
                packets: a.packets.saturating_add(b.packets),
                bytes:   a.bytes.saturating_add(b.bytes),
                cause:   if newer { b.cause } else { a.cause },
            }),
            (a, b) => a.or(b),
        };

        if delta.reason.is_some() {
            self.reason = delta.reason;
        }

        if newer {
            self.dscp  = delta.dscp;
            self.errno = delta.errno;
        }
    }
}

impl Timestamp {
    pub fn zero() -> Self {
        Timestamp(0)
    }

    pub fn from_nanos(ns: u64) -> Self {
        Timestamp(ns)
    }

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1_000_000))
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, d: Duration) -> Self::Output {
        let ns = d.as_nanos().min(u64::MAX as u128) as u64;
        Timestamp(self.0.saturating_add(ns))
    }
}

impl Default for FlowKey {
    fn default() -> Self {
        Self {
            src:       IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dst:       IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sport:     0,
            dport:     0,
            proto:     0,
            ifindex:   0,
            direction: Direction::Ingress,
            vlan:      None,
            icmp_type: 0,
            icmp_code: 0,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dir = match self.direction {
            Direction::Ingress => "in",
            Direction::Egress  => "out",
        };
        write!(f, "{}:{} -> {}:{} proto {} if {} {}",
               self.src, self.sport, self.dst, self.dport,
               self.proto, self.ifindex, dir)
    }
}
