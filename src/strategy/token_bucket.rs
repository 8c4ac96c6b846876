//! Token bucket strategy.

use std::time::Duration;

use super::{elapsed_since, Attempt, Strategy};
use crate::decision::Decision;
use crate::store::KeyState;

/// Continuous-refill token bucket.
///
/// The bucket starts full and refills at `refill_rate` permits per second,
/// fractionally, up to `capacity`. Requests draw whole permits, so bursts up
/// to `capacity` are admitted immediately and the long-run admission rate
/// converges on the refill rate. Continuous refill avoids the boundary burst
/// that fixed windows allow.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u64,
    /// Permits added per second.
    refill_rate: f64,
}

impl TokenBucket {
    pub fn new(capacity: u64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }

    fn refill(&self, tokens: f64, last_refill: Duration, now: Duration) -> f64 {
        let elapsed = elapsed_since(now, last_refill).as_secs_f64();
        (tokens + elapsed * self.refill_rate).min(self.capacity as f64)
    }
}

impl Strategy for TokenBucket {
    fn check(&self, prior: Option<&KeyState>, cost: u32, now: Duration) -> Attempt {
        // A fresh key starts with a full bucket.
        let (tokens, last_refill) = match prior {
            Some(KeyState::TokenBucket {
                tokens,
                last_refill,
            }) => (*tokens, *last_refill),
            _ => (self.capacity as f64, now),
        };

        let refilled = self.refill(tokens, last_refill, now);
        let cost_f = cost as f64;
        // Under a clock regression the elapsed time clamps to zero; keep the
        // later anchor too, or the skipped interval would be credited again
        // once the faster clock is seen next.
        let anchor = now.max(last_refill);

        if refilled >= cost_f {
            let tokens = refilled - cost_f;
            Attempt {
                decision: Decision::allowed(self.capacity, tokens.floor() as u64),
                state: KeyState::TokenBucket {
                    tokens,
                    last_refill: anchor,
                },
            }
        } else {
            // Persist the refreshed level so idle buckets keep refilling
            // even when every request is denied.
            let retry_after = Duration::from_secs_f64((cost_f - refilled) / self.refill_rate);
            Attempt {
                decision: Decision::denied(self.capacity, refilled.floor() as u64, retry_after),
                state: KeyState::TokenBucket {
                    tokens: refilled,
                    last_refill: anchor,
                },
            }
        }
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}
