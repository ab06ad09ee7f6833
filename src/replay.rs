use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use anyhow::Result;
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::interval;
use crate::flow::{encode, Direction, FlowKey, FlowRecord, Timestamp};
use crate::flow::flow::{ACK, SYN, TCP};

#[derive(Clone, Debug)]
pub struct Config {
    pub flows:    u32,
    pub rounds:   u32,
    pub vantages: u32,
    pub rate:     u32,
}

/// Synthetic deltas for `flows` connections, each reported `rounds` times
/// by every one of `vantages` observation points.
pub fn synthesize(cfg: &Config, now: Timestamp) -> Vec<FlowRecord> {
    let mut records = Vec::new();

    for round in 0..cfg.rounds {
        let ts = now + Duration::from_millis(u64::from(round));
        for flow in 0..cfg.flows {
            for vantage in 0..cfg.vantages {
                let mut rec = FlowRecord::new(key(flow, vantage), ts);
                rec.packets   = 1 + u64::from(flow % 7);
                rec.bytes     = rec.packets * 120;
                rec.tcp_flags = match round {
                    0 => SYN,
                    _ => ACK,
                };
                records.push(rec);
            }
        }
    }

    records
}

fn key(flow: u32, vantage: u32) -> FlowKey {
    let [_, a, b, c] = flow.to_be_bytes();
    FlowKey {
        src:       IpAddr::V4(Ipv4Addr::new(10, a, b, c)),
        dst:       IpAddr::V4(Ipv4Addr::new(10, 255, 0, 1)),
        sport:     32768 + (flow % 28000) as u16,
        dport:     443,
        proto:     TCP,
        ifindex:   1 + vantage,
        direction: match vantage % 2 {
            0 => Direction::Egress,
            _ => Direction::Ingress,
        },
        .. Default::default()
    }
}

/// Stream records to a source listener as length-delimited frames,
/// pacing to `rate` records per second when non-zero.
pub async fn replay(addr: &str, records: Vec<FlowRecord>, rate: u32) -> Result<usize> {
    let mut sock = TcpStream::connect(addr).await?;
    info!("replaying {} records to {}", records.len(), addr);

    let mut pace = match rate {
        0    => None,
        rate => Some(interval(Duration::from_secs(1) / rate)),
    };

    let mut buf = Vec::new();
    for rec in &records {
        if let Some(pace) = pace.as_mut() {
            pace.tick().await;
        }

        buf.clear();
        encode(rec, &mut buf);

        sock.write_u32(buf.len() as u32).await?;
        sock.write_all(&buf).await?;
    }

    sock.flush().await?;
    debug!("replay to {} complete", addr);

    Ok(records.len())
}
