//! Sliding window log strategy.

use std::time::Duration;

use super::{elapsed_since, Attempt, Strategy};
use crate::decision::Decision;
use crate::store::{KeyState, LogEntry};

/// Exact sliding window over a log of admission timestamps.
///
/// Every admission is recorded with its weight; a check prunes entries older
/// than `now - window` and admits only while the surviving weight plus the
/// request's cost fits under capacity. Memory is O(window population) per
/// key, bounded by capacity since denied requests are never logged.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: u64,
    window: Duration,
}

impl SlidingWindow {
    pub fn new(capacity: u64, window: Duration) -> Self {
        Self { capacity, window }
    }

    /// Drop log entries that have aged out of the active window.
    fn prune(&self, log: &[LogEntry], now: Duration) -> Vec<LogEntry> {
        match now.checked_sub(self.window) {
            Some(cutoff) => log.iter().copied().filter(|e| e.at >= cutoff).collect(),
            None => log.to_vec(),
        }
    }
}

impl Strategy for SlidingWindow {
    fn check(&self, prior: Option<&KeyState>, cost: u32, now: Duration) -> Attempt {
        let mut log = match prior {
            Some(KeyState::SlidingWindow { log }) => self.prune(log, now),
            _ => Vec::new(),
        };

        let used: u64 = log.iter().map(|e| e.cost as u64).sum();

        if used + cost as u64 <= self.capacity {
            if cost > 0 {
                log.push(LogEntry { at: now, cost });
            }
            let used = used + cost as u64;
            Attempt {
                decision: Decision::allowed(self.capacity, self.capacity - used),
                state: KeyState::SlidingWindow { log },
            }
        } else if cost as u64 > self.capacity {
            // No amount of waiting fits this request; a full window from now
            // is the most the log can ever free up, so hint that rather than
            // an immediate retry.
            Attempt {
                decision: Decision::denied(
                    self.capacity,
                    self.capacity.saturating_sub(used),
                    self.window,
                ),
                state: KeyState::SlidingWindow { log },
            }
        } else {
            // The earliest surviving entry is the first to age out.
            let retry_after = log
                .first()
                .map(|oldest| elapsed_since(oldest.at + self.window, now))
                .unwrap_or(Duration::ZERO);
            Attempt {
                decision: Decision::denied(
                    self.capacity,
                    self.capacity.saturating_sub(used),
                    retry_after,
                ),
                state: KeyState::SlidingWindow { log },
            }
        }
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}
