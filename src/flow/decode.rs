use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use crate::error::Malformed;
use super::flow::*;

pub const VERSION:    u8    = 1;
pub const HEADER_LEN: usize = 88;

const IPV4: u16 = 0x0800;
const IPV6: u16 = 0x86DD;

const EXT_RTT:   u8 = 1;
const EXT_DNS:   u8 = 2;
const EXT_DROPS: u8 = 3;

const RTT_LEN:   usize = 8;
const DNS_LEN:   usize = 12;
const DROPS_LEN: usize = 14;

const V4_MAPPED: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];

pub fn decode(buf: &[u8]) -> Result<FlowRecord, Malformed> {
    if buf.len() < HEADER_LEN {
        return Err(Malformed::Length(buf.len()));
    }

    let (head, tail) = buf.split_at(HEADER_LEN);

    if head[0] != VERSION {
        return Err(Malformed::Version(head[0]));
    }

    let direction = match head[1] {
        0 => Direction::Ingress,
        1 => Direction::Egress,
        n => return Err(Malformed::Direction(n)),
    };

    let ethertype = u16_at(head, 2);
    let src       = addr(ethertype, &head[8..24])?;
    let dst       = addr(ethertype, &head[24..40])?;

    let vlan = match u16_at(head, 48) {
        0 => None,
        n => Some(n),
    };

    let first = Timestamp(u64_at(head, 64));
    let last  = Timestamp(u64_at(head, 72));

    if first > last {
        return Err(Malformed::Timestamps(first.0, last.0));
    }

    let count  = head[81];
    let extlen = u16_at(head, 82) as usize;

    if extlen != tail.len() {
        return Err(Malformed::Extensions(extlen, tail.len()));
    }

    if count as usize * 2 > extlen {
        return Err(Malformed::Count(count, 0));
    }

    let key = FlowKey {
        src:       src,
        dst:       dst,
        sport:     u16_at(head, 40),
        dport:     u16_at(head, 42),
        proto:     head[44],
        ifindex:   u32_at(head, 4),
        direction: direction,
        vlan:      vlan,
        icmp_type: head[45],
        icmp_code: head[46],
    };

    let mut rec = FlowRecord::new(key, first);
    rec.last_seen = last;
    rec.dscp      = head[47];
    rec.tcp_flags = u16_at(head, 50);
    rec.packets   = u32_at(head, 52) as u64;
    rec.bytes     = u64_at(head, 56);
    rec.errno     = head[80];

    extensions(tail, count, &mut rec)?;

    Ok(rec)
}

fn extensions(mut tail: &[u8], count: u8, rec: &mut FlowRecord) -> Result<(), Malformed> {
    let mut seen   = 0usize;
    let mut offset = HEADER_LEN;

    while !tail.is_empty() {
        let (kind, len) = match tail {
            [kind, len, ..] => (*kind, *len as usize),
            _               => return Err(Malformed::Overrun(offset)),
        };

        let payload = tail.get(2..2 + len).ok_or(Malformed::Overrun(offset))?;

        match kind {
            EXT_RTT => {
                let p = exact(kind, payload, RTT_LEN)?;
                rec.rtt = Some(Duration::from_nanos(u64_at(p, 0)));
            }
            EXT_DNS => {
                let p = exact(kind, payload, DNS_LEN)?;
                rec.dns = Some(Dns {
                    id:      u16_at(p, 0),
                    flags:   u16_at(p, 2),
                    latency: Duration::from_nanos(u64_at(p, 4)),
                });
            }
            EXT_DROPS => {
                let p = exact(kind, payload, DROPS_LEN)?;
                rec.drops = Some(Drops {
                    packets: u32_at(p, 0),
                    bytes:   u64_at(p, 4),
                    cause:   u16_at(p, 12),
                });
                rec.reason = Some(Reason::Dropped);
            }
            _ => (),
        }

        tail    = &tail[2 + len..];
        offset += 2 + len;
        seen   += 1;
    }

    match seen == count as usize {
        true  => Ok(()),
        false => Err(Malformed::Count(count, seen)),
    }
}

pub fn encode(rec: &FlowRecord, out: &mut Vec<u8>) {
    let key   = &rec.key;
    let start = out.len();

    let ethertype = match key.src {
        IpAddr::V4(_) => IPV4,
        IpAddr::V6(_) => IPV6,
    };

    let direction = match key.direction {
        Direction::Ingress => 0u8,
        Direction::Egress  => 1u8,
    };

    out.push(VERSION);
    out.push(direction);
    out.extend_from_slice(&ethertype.to_le_bytes());
    out.extend_from_slice(&key.ifindex.to_le_bytes());
    out.extend_from_slice(&octets(key.src));
    out.extend_from_slice(&octets(key.dst));
    out.extend_from_slice(&key.sport.to_le_bytes());
    out.extend_from_slice(&key.dport.to_le_bytes());
    out.push(key.proto);
    out.push(key.icmp_type);
    out.push(key.icmp_code);
    out.push(rec.dscp);
    out.extend_from_slice(&key.vlan.unwrap_or(0).to_le_bytes());
    out.extend_from_slice(&rec.tcp_flags.to_le_bytes());
    out.extend_from_slice(&(rec.packets.min(u32::MAX as u64) as u32).to_le_bytes());
    out.extend_from_slice(&rec.bytes.to_le_bytes());
    out.extend_from_slice(&rec.first_seen.0.to_le_bytes());
    out.extend_from_slice(&rec.last_seen.0.to_le_bytes());
    out.push(rec.errno);

    let mut ext = Vec::new();
    let mut count = 0u8;

    if let Some(rtt) = rec.rtt {
        ext.extend_from_slice(&[EXT_RTT, RTT_LEN as u8]);
        ext.extend_from_slice(&nanos(rtt).to_le_bytes());
        count += 1;
    }

    if let Some(dns) = rec.dns {
        ext.extend_from_slice(&[EXT_DNS, DNS_LEN as u8]);
        ext.extend_from_slice(&dns.id.to_le_bytes());
        ext.extend_from_slice(&dns.flags.to_le_bytes());
        ext.extend_from_slice(&nanos(dns.latency).to_le_bytes());
        count += 1;
    }

    if let Some(drops) = rec.drops {
        ext.extend_from_slice(&[EXT_DROPS, DROPS_LEN as u8]);
        ext.extend_from_slice(&drops.packets.to_le_bytes());
        ext.extend_from_slice(&drops.bytes.to_le_bytes());
        ext.extend_from_slice(&drops.cause.to_le_bytes());
        count += 1;
    }

    out.push(count);
    out.extend_from_slice(&(ext.len() as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);

    debug_assert_eq!(out.len() - start, HEADER_LEN);

    out.extend_from_slice(&ext);
}

fn addr(ethertype: u16, octets: &[u8]) -> Result<IpAddr, Malformed> {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(octets);

    match ethertype {
        IPV4 if raw[..12] == V4_MAPPED => {
            Ok(IpAddr::V4(Ipv4Addr::new(raw[12], raw[13], raw[14], raw[15])))
        }
        IPV4 => Err(Malformed::Address),
        IPV6 => Ok(IpAddr::V6(Ipv6Addr::from(raw))),
        n    => Err(Malformed::Ethertype(n)),
    }
}

fn octets(addr: IpAddr) -> [u8; 16] {
    match addr {
        IpAddr::V4(ip) => ip.to_ipv6_mapped().octets(),
        IpAddr::V6(ip) => ip.octets(),
    }
}

fn exact(kind: u8, payload: &[u8], len: usize) -> Result<&[u8], Malformed> {
    match payload.len() == len {
        true  => Ok(payload),
        false => Err(Malformed::Extension(kind, payload.len())),
    }
}

fn nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

fn u16_at(b: &[u8], n: usize) -> u16 {
    u16::from_le_bytes([b[n], b[n + 1]])
}

fn u32_at(b: &[u8], n: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&b[n..n + 4]);
    u32::from_le_bytes(raw)
}

fn u64_at(b: &[u8], n: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[n..n + 8]);
    u64::from_le_bytes(raw)
}
