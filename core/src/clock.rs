//! Monotonic system clock — owns the Graph Store's logical mutation
//! counter and job-timing measurements.
//!
//! RULE: per spec §6, "monotonic system clock for timing; the simulation
//! clock is independent and measured in minutes." This module owns the
//! former; the cascade engine's tick loop (`cascade::single_run`) owns the
//! latter and never touches this clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A strictly monotonic counter shared by the whole Graph Store. Every
/// mutation draws the next value, so `Node::updated_at` is trivially
/// non-decreasing per node without depending on wall-clock resolution or
/// being vulnerable to system clock adjustment.
#[derive(Debug, Default)]
pub struct LogicalClock {
    counter: AtomicU64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Draw the next logical timestamp. Never returns the same value twice.
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Wraps `std::time::Instant` for measuring job wall-clock duration
/// (`AggregateResult::computation_time_seconds`).
pub struct StopWatch {
    start: Instant,
}

impl StopWatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_clock_strictly_increases() {
        let clock = LogicalClock::new();
        let a = clock.tick();
        let b = clock.tick();
        let c = clock.tick();
        assert!(a < b);
        assert!(b < c);
    }
}
