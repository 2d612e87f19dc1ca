//! Shared linear backoff for the status poller.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::config::PollConfig;

/// Poll-count-driven delay, shared by every polling loop.
///
/// The counter is global to the poller, not per resource: a batch of
/// resources that keeps pending for a while slows down together. The delay
/// holds at the floor for the first `count_without_increase` polls, then
/// climbs by `increase_step` every second poll. Any change to the pending
/// set resets it to the floor.
#[derive(Debug)]
pub struct LinearBackoff {
    start: Duration,
    step: Duration,
    count_without_increase: u32,
    polls: AtomicU32,
}

impl LinearBackoff {
    pub fn new(config: PollConfig) -> Self {
        Self {
            start: config.duration_start,
            step: config.increase_step,
            count_without_increase: config.count_without_increase,
            polls: AtomicU32::new(0),
        }
    }

    /// Record one poll and return the delay to wait before it.
    pub fn next_delay(&self) -> Duration {
        let poll = self.polls.fetch_add(1, Ordering::Relaxed) + 1;
        self.delay_for(poll)
    }

    /// Delay for the nth poll (1-based) since the last reset.
    pub fn delay_for(&self, poll: u32) -> Duration {
        if poll <= self.count_without_increase {
            return self.start;
        }
        let increases = (poll - self.count_without_increase + 1) / 2;
        self.start + self.step * increases
    }

    /// Drop back to the floor delay.
    pub fn reset(&self) {
        self.polls.store(0, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn polls(&self) -> u32 {
        self.polls.load(Ordering::Relaxed)
    }
}
