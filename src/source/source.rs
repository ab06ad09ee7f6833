use std::convert::TryInto;
use std::sync::Arc;
use anyhow::Result;
use crossbeam_channel::{Sender, TrySendError};
use futures::prelude::*;
use log::{debug, error, info, trace};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use crate::error::Error;
use crate::metrics::{self, Metrics};

/// Frame tag for a producer-side overrun report carrying a `u64` count.
pub const DROP_REPORT: u8 = 0xff;

const MAX_FRAME: usize = 64 * 1024;

#[derive(Clone)]
pub struct Source {
    tx:      Sender<Vec<u8>>,
    metrics: Arc<Metrics>,
}

impl Source {
    pub fn new(tx: Sender<Vec<u8>>, metrics: Arc<Metrics>) -> Self {
        Self { tx, metrics }
    }

    /// Hand one raw record to the consumer without waiting. A full channel
    /// drops the record and counts it against the producer.
    pub fn deliver(&self, frame: &[u8]) -> Result<(), Error> {
        if let [DROP_REPORT, count @ ..] = frame {
            if let Ok(count) = count.try_into() {
                let count = u64::from_le_bytes(count);
                trace!("producer reported {} drops", count);
                self.metrics.merge_producer_drops(count);
                return Ok(());
            }
        }

        match self.tx.try_send(frame.to_vec()) {
            Ok(())                             => Ok(()),
            Err(TrySendError::Full(_))         => {
                metrics::inc(&self.metrics.producer_drops);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::Closed),
        }
    }

    pub async fn listen(self, addr: String, cancel: CancellationToken) {
        tokio::select! {
            r = listen(addr, self) => match r {
                Ok(()) => debug!("source finished"),
                Err(e) => error!("source failed: {}", e),
            },
            _ = cancel.cancelled() => debug!("source cancelled"),
        }
    }
}

async fn listen(addr: String, source: Source) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("accepting producers on {}", addr);
    loop {
        let (sock, addr) = listener.accept().await?;
        debug!("producer connection from {}", addr);
        let source = source.clone();
        tokio::spawn(async move {
            match producer(sock, source).await {
                Ok(()) => debug!("producer {} finished", addr),
                Err(e) => error!("producer {} error: {}", addr, e),
            }
        });
    }
}

async fn producer(sock: TcpStream, source: Source) -> Result<()> {
    let mut length = LengthDelimitedCodec::new();
    length.set_max_frame_length(MAX_FRAME);
    let mut framed = FramedRead::new(sock, length);

    while let Some(frame) = framed.try_next().await? {
        source.deliver(&frame)?;
    }

    Ok(())
}
