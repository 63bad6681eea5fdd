//! Exponential backoff for busy-retry loops around the lock-free queue.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Escalating backoff: spin, then yield, then sleep.
///
/// Used wherever a lock-free operation is retried against transient
/// contention or a momentarily full queue. Owned by a single thread, so no
/// atomics are needed for the step counter.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 12;

    /// Create a fresh backoff.
    pub const fn new() -> Self {
        Self { step: 0 }
    }

    /// Reset after making progress.
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Wait one step, escalating on each call.
    pub fn wait(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::sleep(Duration::from_micros(10));
        }
        self.step = self.step.saturating_add(1);
    }

    /// Whether the backoff has escalated past yielding.
    pub fn is_saturated(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }
}
