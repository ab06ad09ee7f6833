use std::collections::HashMap;
use std::fs;
use std::mem;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use anyhow::Result;
use futures::prelude::*;
use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_serde::{SymmetricallyFramed, formats::SymmetricalJson};
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use crate::flow::{FlowKey, FlowRecord};
use super::object::{Meta, Object};

/// Synchronous metadata lookup. Implementations must answer from memory.
pub trait Enrich: Send + Sync {
    fn enrich(&self, key: &FlowKey) -> Option<Meta>;

    fn merge(&self, rs: &mut [FlowRecord]) {
        for r in rs.iter_mut().filter(|r| r.meta.is_none()) {
            r.meta = self.enrich(&r.key);
        }
    }
}

pub struct Augment {
    objs: Mutex<HashMap<IpAddr, Arc<Object>>>,
}

impl Augment {
    pub fn new() -> Self {
        Self {
            objs: Mutex::new(HashMap::new()),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Object>> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn update(&self, objs: Vec<Object>) {
        let mut map = objs.into_iter().map(|o| {
            (o.ip, Arc::new(o))
        }).collect::<HashMap<_, _>>();

        debug!("augment table has {} objects", map.len());

        let mut objs = self.objs.lock();
        mem::swap(&mut *objs, &mut map);
    }

    pub fn len(&self) -> usize {
        self.objs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn listen(self: Arc<Self>, addr: String, cancel: CancellationToken) {
        tokio::select! {
            r = listen(addr, self) => match r {
                Ok(()) => debug!("augment finished"),
                Err(e) => error!("augment failed: {}", e),
            },
            _ = cancel.cancelled() => debug!("augment cancelled"),
        }
    }
}

impl Enrich for Augment {
    fn enrich(&self, key: &FlowKey) -> Option<Meta> {
        let objs = self.objs.lock();
        let src  = objs.get(&key.src).cloned();
        let dst  = objs.get(&key.dst).cloned();
        match (&src, &dst) {
            (None, None) => None,
            _            => Some(Meta { src, dst }),
        }
    }
}

impl Default for Augment {
    fn default() -> Self {
        Self::new()
    }
}

async fn listen(addr: String, augment: Arc<Augment>) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("augment listening on {}", addr);
    loop {
        let (sock, addr) = listener.accept().await?;
        debug!("connection from {}", addr);
        let augment = augment.clone();

        tokio::spawn(async move {
            match client(sock, augment).await {
                Ok(()) => debug!("client {} finished", addr),
                Err(e) => error!("client {} error: {}", addr, e),
            }
        });
    }
}

async fn client(sock: TcpStream, augment: Arc<Augment>) -> Result<()> {
    let mut length = LengthDelimitedCodec::new();
    length.set_max_frame_length(32 * 1024 * 1024);
    let framed = FramedRead::new(sock, length);
    let format = SymmetricalJson::<Vec<Object>>::default();

    let mut codec = SymmetricallyFramed::new(framed, format);

    while let Some(objs) = codec.try_next().await? {
        augment.update(objs);
    }

    Ok(())
}
