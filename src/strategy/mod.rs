//! Admission strategies.
//!
//! Each strategy is a pure function over `(prior state, cost, now)`: it
//! computes the decision and the successor state, and the facade is the one
//! that persists the successor with a compare-and-swap. Keeping the
//! strategies free of storage and locking is what lets one CAS-retry loop
//! serve all four algorithms against any backend.

mod fixed_window;
mod leaky_bucket;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindow;
pub use leaky_bucket::LeakyBucket;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;

use std::time::Duration;

use crate::config::{LimiterSettings, StrategyKind};
use crate::decision::Decision;
use crate::store::KeyState;

/// The result of evaluating one check: the decision to hand back and the
/// state to persist. A successor state is produced on denial too (buckets
/// keep refilling / draining, logs get pruned, windows roll over even when
/// the request itself is rejected).
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub decision: Decision,
    pub state: KeyState,
}

/// A rate limiting algorithm.
///
/// Implementations must be deterministic given the same inputs; all
/// randomness-free algorithms here are. `prior` is `None` for a key the
/// store has never seen (or has evicted), in which case the strategy
/// initializes fresh state. A prior state of the wrong variant (left over
/// from a strategy change) is treated as absent.
pub trait Strategy: Send + Sync {
    /// Evaluate one request of weight `cost` at time `now`.
    ///
    /// A `cost` of zero is a probe: always admitted, but the successor state
    /// still reflects the refill / prune / leak that `now` implies.
    fn check(&self, prior: Option<&KeyState>, cost: u32, now: Duration) -> Attempt;

    /// The configured capacity of this limiter.
    fn capacity(&self) -> u64;
}

/// Build the strategy selected by the settings.
///
/// Settings must already be validated; see
/// [`LimiterSettings::validate`](crate::config::LimiterSettings::validate).
pub fn build_strategy(settings: &LimiterSettings) -> Box<dyn Strategy> {
    match settings.strategy {
        StrategyKind::TokenBucket => Box::new(TokenBucket::new(
            settings.capacity,
            settings.effective_refill_rate(),
        )),
        StrategyKind::FixedWindow => {
            Box::new(FixedWindow::new(settings.capacity, settings.window()))
        }
        StrategyKind::SlidingWindow => {
            Box::new(SlidingWindow::new(settings.capacity, settings.window()))
        }
        StrategyKind::LeakyBucket => Box::new(LeakyBucket::new(
            settings.capacity,
            settings.effective_refill_rate(),
        )),
    }
}

/// Elapsed time with clock-regression clamped to zero, so a timestamp from
/// the future never mints negative-time credit.
pub(crate) fn elapsed_since(now: Duration, earlier: Duration) -> Duration {
    now.checked_sub(earlier).unwrap_or(Duration::ZERO)
}
