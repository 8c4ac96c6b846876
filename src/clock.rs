//! Monotonic time sources for the rate limiting algorithms.
//!
//! Every strategy reads time through the [`Clock`] trait so that tests can
//! drive time by hand instead of sleeping. Timestamps are expressed as a
//! [`Duration`] since an arbitrary per-clock epoch; only differences between
//! readings are meaningful.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// A monotonic time source.
///
/// Implementations must never run backwards on their own; the engine still
/// guards against regression (treating negative elapsed time as zero) in case
/// a shared backend hands back a timestamp from a faster clock.
pub trait Clock: Send + Sync {
    /// Current reading, as elapsed time since the clock's epoch.
    fn now(&self) -> Duration;
}

/// Production clock backed by [`Instant`], anchored at construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Hand-driven clock for tests.
///
/// Cloning yields a handle to the same underlying reading, so a test can keep
/// one handle to advance time while the limiter holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<RwLock<Duration>>,
}

impl ManualClock {
    /// New clock pinned at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// New clock pinned at the given reading.
    pub fn at(now: Duration) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write();
        *now += delta;
    }

    /// Set the clock to an absolute reading.
    pub fn set(&self, now: Duration) {
        *self.now.write() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.read()
    }
}
