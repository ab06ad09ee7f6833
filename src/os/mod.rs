use std::mem::MaybeUninit;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use crate::flow::Timestamp;

pub fn getpid() -> u32 {
    unsafe {
        libc::getpid() as u32
    }
}

/// Kernel flow records are stamped with CLOCK_MONOTONIC, so userspace
/// eviction reads the same clock.
pub fn monotonic() -> Timestamp {
    let mut ts = MaybeUninit::<libc::timespec>::uninit();
    let ts = unsafe {
        match libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr()) {
            0 => ts.assume_init(),
            _ => return Timestamp::zero(),
        }
    };
    Timestamp(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

/// Wall-clock time at which the monotonic clock read zero.
pub fn boot_time() -> SystemTime {
    let now = SystemTime::now();
    let up  = Duration::from_nanos(monotonic().as_nanos());
    now.checked_sub(up).unwrap_or(UNIX_EPOCH)
}
