use futures::future::{BoxFuture, FutureExt};
use futures_util::sink::SinkExt;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_serde::{SymmetricallyFramed, formats::SymmetricalJson};
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use crate::error::Error;
use super::{Batch, Sink};

type Codec = SymmetricallyFramed<
    FramedWrite<TcpStream, LengthDelimitedCodec>,
    Batch,
    SymmetricalJson<Batch>,
>;

/// Length-delimited JSON batches over TCP. A failed write drops the
/// connection and the next batch reconnects.
pub struct Socket {
    name: String,
    addr: String,
    conn: Mutex<Option<Codec>>,
}

impl Socket {
    pub fn new(addr: String) -> Self {
        Self {
            name: format!("tcp:{}", addr),
            addr: addr,
            conn: Mutex::new(None),
        }
    }
}

impl Sink for Socket {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, batch: Batch) -> BoxFuture<'_, Result<(), Error>> {
        async move {
            let mut conn = self.conn.lock().await;

            let mut codec = match conn.take() {
                Some(codec) => codec,
                None        => connect(&self.addr).await?,
            };

            match codec.send(batch).await {
                Ok(()) => *conn = Some(codec),
                Err(e) => {
                    warn!("{} write error: {}", self.name, e);
                    return Err(e.into());
                }
            }

            Ok(())
        }.boxed()
    }
}

async fn connect(addr: &str) -> Result<Codec, Error> {
    let sock = TcpStream::connect(addr).await?;
    debug!("connected to {}", addr);

    let mut length = LengthDelimitedCodec::new();
    length.set_max_frame_length(32 * 1024 * 1024);
    let framed = FramedWrite::new(sock, length);
    let format = SymmetricalJson::default();

    Ok(SymmetricallyFramed::new(framed, format))
}
