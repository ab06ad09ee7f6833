use std::time::Duration;
use crate::flow::Timestamp;

/// Fixed-cadence deadline. Missed periods collapse into one firing and
/// the schedule stays aligned to its start.
pub struct Tick {
    every: Duration,
    next:  Timestamp,
}

impl Tick {
    pub fn start(every: Duration, now: Timestamp) -> Self {
        Self {
            every: every,
            next:  now + every,
        }
    }

    pub fn due(&mut self, now: Timestamp) -> bool {
        if now < self.next {
            return false;
        }

        let every = self.every.as_nanos() as u64;
        let late  = now.since(self.next).as_nanos() as u64;
        let skip  = match every {
            0 => 1,
            n => late / n + 1,
        };

        let next = self.next.as_nanos().saturating_add(every.saturating_mul(skip));
        self.next = Timestamp::from_nanos(next);

        true
    }
}
