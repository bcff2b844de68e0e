//! Monotonic time source.

use std::io;
use std::time::Duration;

/// A source of monotonic time.
///
/// The loop driver reads the clock on either side of the backend poll, both
/// to trace how long the poll actually blocked and to walk the elapsed time
/// off the scheduled timer list. Timer deadlines themselves are
/// delta-encoded and never stored as absolute points in time, so this is
/// the only place the engine touches a clock.
pub trait Clock {
    /// Monotonic time since some fixed point, typically boot.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by the operating system's monotonic clock.
#[derive(Debug)]
pub struct Monotonic;

#[cfg(unix)]
impl Clock for Monotonic {
    fn now(&self) -> Duration {
        let mut time = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut time) } == -1 {
            // Only possible with a bogus clock id or an unmapped timespec.
            panic!("unable to read the monotonic clock: {}", io::Error::last_os_error());
        }
        Duration::new(time.tv_sec as u64, time.tv_nsec as u32)
    }
}
