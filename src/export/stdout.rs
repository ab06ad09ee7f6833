use std::time::{SystemTime, UNIX_EPOCH};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio::io::{self, AsyncWriteExt};
use crate::error::Error;
use crate::flow::{FlowRecord, Timestamp};
use crate::os::boot_time;
use super::{Batch, Sink};

/// JSON lines on stdout, with wall-clock start and end times.
pub struct Stdout {
    boot: u64,
}

#[derive(Serialize)]
struct Line<'a> {
    #[serde(flatten)]
    record:     &'a FlowRecord,
    time_start: u64,
    time_end:   u64,
}

impl Stdout {
    pub fn new() -> Self {
        Self::since(boot_time())
    }

    pub fn since(boot: SystemTime) -> Self {
        let boot = boot.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            boot: boot.as_millis() as u64,
        }
    }

    fn wall(&self, ts: Timestamp) -> u64 {
        self.boot + ts.as_nanos() / 1_000_000
    }

    pub fn render(&self, batch: &[FlowRecord]) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        for record in batch {
            let line = Line {
                record:     record,
                time_start: self.wall(record.first_seen),
                time_end:   self.wall(record.last_seen),
            };
            serde_json::to_writer(&mut out, &line)?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

impl Default for Stdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for Stdout {
    fn name(&self) -> &str {
        "stdout"
    }

    fn send(&self, batch: Batch) -> BoxFuture<'_, Result<(), Error>> {
        async move {
            let out = self.render(&batch)?;
            let mut stdout = io::stdout();
            stdout.write_all(&out).await?;
            stdout.flush().await?;
            Ok(())
        }.boxed()
    }
}
