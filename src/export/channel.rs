use crossbeam_channel::{Sender, TrySendError};
use futures::future::{self, BoxFuture, FutureExt};
use crate::error::Error;
use super::{Batch, Sink};

/// Hands batches to an in-process consumer when the agent is embedded
/// in a larger pipeline.
pub struct Channel {
    tx: Sender<Batch>,
}

impl Channel {
    pub fn new(tx: Sender<Batch>) -> Self {
        Self { tx }
    }
}

impl Sink for Channel {
    fn name(&self) -> &str {
        "channel"
    }

    fn send(&self, batch: Batch) -> BoxFuture<'_, Result<(), Error>> {
        let result = match self.tx.try_send(batch) {
            Ok(())                             => Ok(()),
            Err(TrySendError::Full(_))         => Err(Error::Export("channel full".to_owned())),
            Err(TrySendError::Disconnected(_)) => Err(Error::Export("channel closed".to_owned())),
        };
        future::ready(result).boxed()
    }
}
