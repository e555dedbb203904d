//! # Monotonic Clock and Sleep
//!
//! Every pause in the monitor (trigger pulse widths, LCD settle delays, the
//! sampling interval, the countdown ticks, the button poll) goes through the
//! [`Clock`] trait. Production code uses [`SystemClock`]; tests and the
//! `--simulate` mode can use [`crate::sim::SimClock`], which runs on virtual
//! time so a full ten second countdown completes instantly.

use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source plus a blocking sleep.
///
/// `now()` is the time elapsed since the clock was created. Implementations
/// must never go backwards.
pub trait Clock {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`Instant`] and [`thread::sleep`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        clock.sleep(Duration::from_millis(2));
        let b = clock.now();
        assert!(b >= a + Duration::from_millis(2));
    }
}
