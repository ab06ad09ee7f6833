use anyhow::Result;
use clap::{App, ArgMatches, load_yaml, value_t};
use env_logger::Builder;
use jemallocator::Jemalloc;
use log::info;
use log::LevelFilter::*;
use tokio::runtime::Runtime;
use flowtap::agent::agent;
use flowtap::os::{getpid, monotonic};
use flowtap::replay::{self, replay, synthesize};

#[global_allocator]
static ALLOC: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    let yaml = load_yaml!("args.yml");
    let ver  = env!("CARGO_PKG_VERSION");
    let args = App::from_yaml(&yaml).version(ver).get_matches();

    let (module, level) = match args.occurrences_of("verbose") {
        0 => (Some(module_path!()), Info),
        1 => (Some(module_path!()), Debug),
        2 => (Some(module_path!()), Trace),
        _ => (None,                 Trace),
    };
    Builder::from_default_env().filter(module, level).init();

    info!("initializing flowtap {} pid {}", ver, getpid());

    match args.subcommand() {
        ("agent",  Some(args)) => agent(args),
        ("replay", Some(args)) => load(args),
        _                      => unreachable!(),
    }
}

fn load(args: &ArgMatches) -> Result<()> {
    let addr = value_t!(args, "addr", String)?;
    let cfg  = replay::Config {
        flows:    value_t!(args, "flows",    u32)?,
        rounds:   value_t!(args, "rounds",   u32)?,
        vantages: value_t!(args, "vantages", u32)?,
        rate:     value_t!(args, "rate",     u32)?,
    };

    let records = synthesize(&cfg, monotonic());
    let sent    = Runtime::new()?.block_on(replay(&addr, records, cfg.rate))?;

    info!("sent {} records to {}", sent, addr);

    Ok(())
}
