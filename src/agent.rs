use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use anyhow::{anyhow, Result};
use clap::ArgMatches;
use crossbeam_channel::bounded;
use log::{info, warn};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use crate::args::overlay;
use crate::augment::{Augment, Enrich};
use crate::config::{Config, SinkConfig};
use crate::export::{Router, Sink, Socket, Stdout};
use crate::metrics::Metrics;
use crate::source::Source;
use crate::trace::{Monotonic, Tracer};

pub fn agent(args: &ArgMatches) -> Result<()> {
    let cfg = match args.value_of("config") {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            warn!("config {} unusable, using defaults: {}", path, e);
            Config::default()
        }),
        None       => Config::default(),
    };

    let cfg = overlay(cfg, args)?.sanitize();

    run(cfg)
}

pub fn run(cfg: Config) -> Result<()> {
    let rt      = Runtime::new()?;
    let metrics = Metrics::new();
    let cancel  = CancellationToken::new();

    let augment = Arc::new(Augment::new());
    if let Some(path) = &cfg.augment.file {
        match Augment::load(path) {
            Ok(objs) => augment.update(objs),
            Err(e)   => warn!("augment file {} unusable: {}", path, e),
        }
    }
    if let Some(addr) = &cfg.augment.listen {
        rt.spawn(augment.clone().listen(addr.clone(), cancel.clone()));
    }

    let (tx, rx) = bounded(cfg.channel);
    let source = Source::new(tx, metrics.clone());
    rt.spawn(source.listen(cfg.listen.clone(), cancel.clone()));

    let router = Router::new(rt.handle().clone(), sinks(&cfg.export.sinks), cfg.send_timeout(), metrics.clone());
    let enrich: Arc<dyn Enrich> = augment;

    let mut tracer = Tracer::new(cfg.tracer(), rx, router, enrich, metrics, cancel.clone(), Monotonic);
    let dump = tracer.dump();

    let mut signals = Signals::new(&[SIGINT, SIGTERM, SIGUSR1])?;
    let handle = signals.handle();

    let tracer = thread::Builder::new().name("tracer".to_owned()).spawn(move || {
        let result = tracer.run();
        handle.close();
        result
    })?;

    for signal in signals.forever() {
        match signal {
            SIGINT | SIGTERM => {
                info!("shutting down");
                cancel.cancel();
                break;
            }
            SIGUSR1          => dump.store(true, Ordering::Release),
            _                => unreachable!(),
        }
    }

    cancel.cancel();

    let result = tracer.join().map_err(|_| anyhow!("tracer panicked"))?;

    drop(rt);

    result
}

fn sinks(cfg: &[SinkConfig]) -> Vec<Box<dyn Sink>> {
    cfg.iter().map(|sink| -> Box<dyn Sink> {
        match sink {
            SinkConfig::Stdout       => Box::new(Stdout::new()),
            SinkConfig::Tcp { addr } => Box::new(Socket::new(addr.clone())),
        }
    }).collect()
}
