use std::net::IpAddr;
use crate::flow::{Direction, FlowKey, FlowRecord, Timestamp};
use crate::flow::flow::TCP;

pub fn key(src: &str, sport: u16, dst: &str, dport: u16) -> FlowKey {
    FlowKey {
        src:       parse(src),
        dst:       parse(dst),
        sport:     sport,
        dport:     dport,
        proto:     TCP,
        ifindex:   2,
        direction: Direction::Ingress,
        .. Default::default()
    }
}

pub fn record(key: FlowKey, ms: u64, packets: u64, bytes: u64, flags: u16) -> FlowRecord {
    let mut rec = FlowRecord::new(key, Timestamp::from_millis(ms));
    rec.packets   = packets;
    rec.bytes     = bytes;
    rec.tcp_flags = flags;
    rec
}

pub fn vantage(key: FlowKey, ifindex: u32) -> FlowKey {
    FlowKey {
        ifindex:   ifindex,
        direction: flip(key.direction),
        .. key
    }
}

fn flip(direction: Direction) -> Direction {
    match direction {
        Direction::Ingress => Direction::Egress,
        Direction::Egress  => Direction::Ingress,
    }
}

pub fn swap(key: FlowKey) -> FlowKey {
    FlowKey {
        src:   key.dst,
        dst:   key.src,
        sport: key.dport,
        dport: key.sport,
        .. key
    }
}

fn parse(addr: &str) -> IpAddr {
    match addr.parse() {
        Ok(addr) => addr,
        Err(e)   => panic!("bad address {}: {}", addr, e),
    }
}
