use std::time::Duration;
use anyhow::Result;
use crate::error::Malformed;
use crate::fixture::{key, record};
use super::{decode, encode, Dns, Drops, FlowRecord, Reason, Timestamp};
use super::decode::HEADER_LEN;
use super::flow::{ACK, SYN};

fn sample() -> FlowRecord {
    let mut k = key("192.168.1.10", 51234, "10.96.0.10", 53);
    k.proto   = super::flow::UDP;
    k.ifindex = 14;
    k.vlan    = Some(120);

    let mut rec = record(k, 1_000, 3, 220, 0);
    rec.last_seen = Timestamp::from_millis(1_250);
    rec.dscp      = 46;
    rec.dns       = Some(Dns {
        id:      0xbeef,
        flags:   0x8180,
        latency: Duration::from_micros(870),
    });
    rec
}

#[test]
fn roundtrip() -> Result<()> {
    let rec = sample();

    let mut buf = Vec::new();
    encode(&rec, &mut buf);

    assert_eq!(decode(&buf)?, rec);

    Ok(())
}

#[test]
fn roundtrip_v6_extensions() -> Result<()> {
    let mut rec = record(key("fd00::1", 443, "fd00::2", 60000), 0, 9, 12_000, SYN | ACK);
    rec.last_seen = Timestamp::from_nanos(987_654_321);
    rec.rtt       = Some(Duration::from_nanos(125_000));
    rec.drops     = Some(Drops { packets: 2, bytes: 3000, cause: 7 });
    rec.reason    = Some(Reason::Dropped);
    rec.errno     = 12;

    let mut buf = Vec::new();
    encode(&rec, &mut buf);

    let out = decode(&buf)?;
    assert_eq!(out, rec);
    assert_eq!(out.key.src, "fd00::1".parse::<std::net::IpAddr>()?);

    Ok(())
}

#[test]
fn truncated() -> Result<()> {
    let mut buf = Vec::new();
    encode(&sample(), &mut buf);

    for n in 0..HEADER_LEN {
        assert_eq!(decode(&buf[..n]), Err(Malformed::Length(n)));
    }

    for n in HEADER_LEN..buf.len() {
        assert!(decode(&buf[..n]).is_err());
    }

    Ok(())
}

#[test]
fn extension_length_mismatch() -> Result<()> {
    let mut buf = Vec::new();
    encode(&sample(), &mut buf);
    buf.push(0);

    assert_eq!(decode(&buf), Err(Malformed::Extensions(14, 15)));

    Ok(())
}

#[test]
fn extension_overrun() -> Result<()> {
    let mut buf = Vec::new();
    encode(&sample(), &mut buf);
    buf[HEADER_LEN + 1] = 200;

    assert_eq!(decode(&buf), Err(Malformed::Overrun(HEADER_LEN)));

    Ok(())
}

#[test]
fn extension_count_mismatch() -> Result<()> {
    let mut buf = Vec::new();
    encode(&sample(), &mut buf);
    buf[81] = 2;

    assert_eq!(decode(&buf), Err(Malformed::Count(2, 1)));

    buf[81] = 9;
    assert_eq!(decode(&buf), Err(Malformed::Count(9, 0)));

    Ok(())
}

#[test]
fn unknown_extension_skipped() -> Result<()> {
    let rec = sample();

    let mut buf = Vec::new();
    encode(&rec, &mut buf);
    buf.extend_from_slice(&[0x7f, 3, 1, 2, 3]);
    buf[81] += 1;
    let len = (buf.len() - HEADER_LEN) as u16;
    buf[82..84].copy_from_slice(&len.to_le_bytes());

    assert_eq!(decode(&buf)?, rec);

    Ok(())
}

#[test]
fn invalid_header_fields() -> Result<()> {
    let mut buf = Vec::new();
    encode(&sample(), &mut buf);

    let mut bad = buf.clone();
    bad[0] = 2;
    assert_eq!(decode(&bad), Err(Malformed::Version(2)));

    let mut bad = buf.clone();
    bad[1] = 5;
    assert_eq!(decode(&bad), Err(Malformed::Direction(5)));

    let mut bad = buf.clone();
    bad[2..4].copy_from_slice(&0x0806u16.to_le_bytes());
    assert_eq!(decode(&bad), Err(Malformed::Ethertype(0x0806)));

    let mut bad = buf.clone();
    bad[8] = 1;
    assert_eq!(decode(&bad), Err(Malformed::Address));

    let mut bad = buf.clone();
    bad[64..72].copy_from_slice(&u64::MAX.to_le_bytes());
    assert!(matches!(decode(&bad), Err(Malformed::Timestamps(..))));

    Ok(())
}
