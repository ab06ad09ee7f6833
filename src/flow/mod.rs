pub mod decode;
pub mod flow;

pub use decode::{decode, encode};
pub use flow::{Direction, Dns, Drops, FlowKey, FlowRecord, Reason, Timestamp};

#[cfg(test)]
mod test;
