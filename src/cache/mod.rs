pub use cache::{Config, FlowCache};

mod cache;

#[cfg(test)]
mod test;
