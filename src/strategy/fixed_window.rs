//! Fixed window counter strategy.

use std::time::Duration;

use super::{elapsed_since, Attempt, Strategy};
use crate::decision::Decision;
use crate::store::KeyState;

/// Counter over aligned, non-overlapping windows.
///
/// The cheapest strategy: O(1) state, one counter reset per rollover. The
/// documented trade-off is the seam burst: up to `2 * capacity` requests can
/// land within one window-length interval straddling a boundary (capacity at
/// the end of one window, capacity at the start of the next). Callers who
/// cannot tolerate that use [`super::SlidingWindow`] instead; this strategy
/// deliberately keeps the behavior.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    capacity: u64,
    window: Duration,
}

impl FixedWindow {
    pub fn new(capacity: u64, window: Duration) -> Self {
        Self { capacity, window }
    }

    /// Start of the aligned window containing `now`.
    fn window_start(&self, now: Duration) -> Duration {
        let window = self.window.as_nanos();
        let aligned = (now.as_nanos() / window) * window;
        Duration::from_nanos(aligned as u64)
    }
}

impl Strategy for FixedWindow {
    fn check(&self, prior: Option<&KeyState>, cost: u32, now: Duration) -> Attempt {
        let current_start = self.window_start(now);

        // Carry the count only while still inside the same aligned window.
        let count = match prior {
            Some(KeyState::FixedWindow {
                window_start,
                count,
            }) if *window_start == current_start => *count,
            _ => 0,
        };

        let cost = cost as u64;
        if count + cost <= self.capacity {
            let count = count + cost;
            Attempt {
                decision: Decision::allowed(self.capacity, self.capacity - count),
                state: KeyState::FixedWindow {
                    window_start: current_start,
                    count,
                },
            }
        } else {
            let retry_after = elapsed_since(current_start + self.window, now);
            Attempt {
                decision: Decision::denied(
                    self.capacity,
                    self.capacity.saturating_sub(count),
                    retry_after,
                ),
                state: KeyState::FixedWindow {
                    window_start: current_start,
                    count,
                },
            }
        }
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_within_window() {
        let window = FixedWindow::new(3, Duration::from_secs(60));
        let mut state = None;

        for expected_remaining in [2, 1, 0] {
            let attempt = window.check(state.as_ref(), 1, Duration::from_secs(5));
            assert!(attempt.decision.allowed);
            assert_eq!(attempt.decision.remaining, expected_remaining);
            state = Some(attempt.state);
        }

        let attempt = window.check(state.as_ref(), 1, Duration::from_secs(5));
        assert!(!attempt.decision.allowed);
        assert_eq!(attempt.decision.retry_after, Duration::from_secs(55));
    }

    #[test]
    fn test_rollover_resets_count() {
        let window = FixedWindow::new(15, Duration::from_secs(60));
        let mut state = None;

        // Fill the window just before the boundary.
        for _ in 0..15 {
            let attempt = window.check(state.as_ref(), 1, Duration::from_secs(59));
            assert!(attempt.decision.allowed);
            state = Some(attempt.state);
        }
        let attempt = window.check(state.as_ref(), 1, Duration::from_secs(59));
        assert!(!attempt.decision.allowed);
        state = Some(attempt.state);

        // The very next second starts a new window.
        let attempt = window.check(state.as_ref(), 1, Duration::from_secs(60));
        assert!(attempt.decision.allowed);
        assert_eq!(attempt.decision.remaining, 14);
    }

    #[test]
    fn test_requests_straddling_boundary_count_separately() {
        let window = FixedWindow::new(10, Duration::from_secs(10));

        let before = window.check(None, 1, Duration::from_millis(9_999));
        let after = window.check(Some(&before.state), 1, Duration::from_millis(10_001));

        match (&before.state, &after.state) {
            (
                KeyState::FixedWindow {
                    window_start: a, ..
                },
                KeyState::FixedWindow {
                    window_start: b,
                    count,
                },
            ) => {
                assert_ne!(a, b);
                assert_eq!(*count, 1);
            }
            other => panic!("unexpected states {:?}", other),
        }
    }

    #[test]
    fn test_seam_burst_is_preserved() {
        // 2 * capacity admissions inside one window-length interval that
        // straddles the boundary. Accepted behavior, not a bug.
        let window = FixedWindow::new(5, Duration::from_secs(10));
        let mut state = None;
        let mut admitted = 0;

        for _ in 0..5 {
            let attempt = window.check(state.as_ref(), 1, Duration::from_secs(9));
            admitted += attempt.decision.allowed as u32;
            state = Some(attempt.state);
        }
        for _ in 0..5 {
            let attempt = window.check(state.as_ref(), 1, Duration::from_secs(11));
            admitted += attempt.decision.allowed as u32;
            state = Some(attempt.state);
        }

        assert_eq!(admitted, 10);
    }

    #[test]
    fn test_weighted_cost() {
        let window = FixedWindow::new(10, Duration::from_secs(60));

        let attempt = window.check(None, 7, Duration::ZERO);
        assert!(attempt.decision.allowed);
        assert_eq!(attempt.decision.remaining, 3);

        let attempt = window.check(Some(&attempt.state), 4, Duration::ZERO);
        assert!(!attempt.decision.allowed);
        assert_eq!(attempt.decision.remaining, 3);
    }

    #[test]
    fn test_zero_cost_probe() {
        let window = FixedWindow::new(2, Duration::from_secs(60));
        let full = window.check(None, 2, Duration::ZERO).state;

        let attempt = window.check(Some(&full), 0, Duration::ZERO);
        assert!(attempt.decision.allowed);
        assert_eq!(attempt.decision.remaining, 0);
        assert_eq!(attempt.state, full);
    }
}
