use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use crate::flow::FlowRecord;

/// Lossy flow identity shared by every vantage point that observed the
/// same packets: interface, direction and VLAN are left out, endpoint
/// order is kept so request and reply streams stay distinct.
///
/// `first_seen` is bucketed on fixed boundaries, so two vantages whose
/// first sightings straddle a boundary hash differently and are both
/// forwarded. A wider bucket narrows that gap at the cost of merging
/// reuses of the same five-tuple.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub fn of(rec: &FlowRecord, bucket: Duration) -> Self {
        let key = &rec.key;

        let bucket = match bucket.as_nanos() as u64 {
            0 => 0,
            n => rec.first_seen.as_nanos() / n,
        };

        let mut hasher = DefaultHasher::new();
        key.src.hash(&mut hasher);
        key.dst.hash(&mut hasher);
        key.sport.hash(&mut hasher);
        key.dport.hash(&mut hasher);
        key.proto.hash(&mut hasher);
        bucket.hash(&mut hasher);

        Fingerprint(hasher.finish())
    }
}
