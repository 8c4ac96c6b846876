//! Leaky bucket strategy.

use std::time::Duration;

use super::{elapsed_since, Attempt, Strategy};
use crate::decision::Decision;
use crate::store::KeyState;

/// Queue-model leaky bucket.
///
/// The mirror image of [`super::TokenBucket`]: instead of a reservoir that
/// refills, this models a queue that drains at `leak_rate` permits per
/// second. Each admission raises the level by its cost; a request whose cost
/// would push the level past capacity is denied. The effect is a steady
/// output rate with no burst allowance beyond the queue depth, which is why
/// the two bucket strategies are offered separately.
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    capacity: u64,
    /// Permits drained per second.
    leak_rate: f64,
}

impl LeakyBucket {
    pub fn new(capacity: u64, leak_rate: f64) -> Self {
        Self {
            capacity,
            leak_rate,
        }
    }

    fn drain(&self, level: f64, last_leak: Duration, now: Duration) -> f64 {
        let elapsed = elapsed_since(now, last_leak).as_secs_f64();
        (level - elapsed * self.leak_rate).max(0.0)
    }
}

impl Strategy for LeakyBucket {
    fn check(&self, prior: Option<&KeyState>, cost: u32, now: Duration) -> Attempt {
        // A fresh key starts with an empty queue.
        let (level, last_leak) = match prior {
            Some(KeyState::LeakyBucket { level, last_leak }) => (*level, *last_leak),
            _ => (0.0, now),
        };

        let drained = self.drain(level, last_leak, now);
        let cost_f = cost as f64;
        let capacity_f = self.capacity as f64;
        // Keep the later anchor under a clock regression, matching the
        // zero-clamped drain; otherwise the skipped interval drains again
        // once the faster clock is seen next.
        let anchor = now.max(last_leak);

        if drained + cost_f <= capacity_f {
            let level = drained + cost_f;
            Attempt {
                decision: Decision::allowed(
                    self.capacity,
                    (capacity_f - level).floor() as u64,
                ),
                state: KeyState::LeakyBucket {
                    level,
                    last_leak: anchor,
                },
            }
        } else {
            // Persist the drained level so the queue keeps emptying while
            // requests are rejected.
            let retry_after =
                Duration::from_secs_f64((drained + cost_f - capacity_f) / self.leak_rate);
            Attempt {
                decision: Decision::denied(
                    self.capacity,
                    (capacity_f - drained).floor().max(0.0) as u64,
                    retry_after,
                ),
                state: KeyState::LeakyBucket {
                    level: drained,
                    last_leak: anchor,
                },
            }
        }
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}
