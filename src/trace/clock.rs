use crate::flow::Timestamp;
use crate::os;

/// Source of "now" for eviction and dedup windows. Must share an epoch
/// with the timestamps carried by decoded records.
pub trait Clock: Send {
    fn now(&self) -> Timestamp;
}

pub struct Monotonic;

impl Clock for Monotonic {
    fn now(&self) -> Timestamp {
        os::monotonic()
    }
}
