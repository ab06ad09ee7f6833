pub mod agent;
pub mod args;
pub mod augment;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod flow;
pub mod metrics;
pub mod os;
pub mod replay;
pub mod source;
pub mod trace;

#[cfg(test)]
mod fixture;
