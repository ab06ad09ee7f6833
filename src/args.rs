use std::str::FromStr;
use anyhow::Result;
use clap::{ArgMatches, value_t};
use crate::config::{Config, SinkConfig};
use crate::dedup::Strategy;

/// Apply command line flags on top of file settings.
pub fn overlay(mut cfg: Config, args: &ArgMatches) -> Result<Config> {
    if let Some(addr) = args.value_of("listen") {
        cfg.listen = addr.to_owned();
    }

    if let Some(n) = opt(args.value_of("max-flows"))? {
        cfg.cache.max_flows = n;
    }

    if let Some(strategy) = opt::<Strategy>(args.value_of("dedup"))? {
        cfg.dedup.strategy = strategy;
    }

    if let Some(sinks) = args.values_of("sink") {
        cfg.export.sinks = sinks.map(sink).collect::<Result<_>>()?;
    }

    if args.is_present("augment-file") {
        cfg.augment.file = Some(value_t!(args, "augment-file", String)?);
    }

    if args.is_present("augment-listen") {
        cfg.augment.listen = Some(value_t!(args, "augment-listen", String)?);
    }

    Ok(cfg)
}

pub fn sink(arg: &str) -> Result<SinkConfig> {
    match arg.split_once(':') {
        None if arg == "stdout"  => Ok(SinkConfig::Stdout),
        Some(("tcp", addr))      => Ok(SinkConfig::Tcp { addr: addr.to_owned() }),
        _                        => Err(invalid(arg).into()),
    }
}

pub fn opt<T: FromStr>(arg: Option<&str>) -> Result<Option<T>> {
    Ok(arg.map(|s| T::from_str(s).map_err(|_| invalid(s))).transpose()?)
}

fn invalid(arg: &str) -> clap::Error {
    let msg  = format!("invalid argument value '{}'", arg);
    let kind = clap::ErrorKind::InvalidValue;
    clap::Error::with_description(&msg, kind)
}
