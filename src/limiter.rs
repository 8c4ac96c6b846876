//! The rate limiter facade combining a strategy, a store, and a clock.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{FailurePolicy, LimiterSettings};
use crate::decision::Decision;
use crate::error::{FloodgateError, Result};
use crate::store::{MemoryStore, StateStore};
use crate::strategy::{build_strategy, Strategy};

/// The public entry point for admission control.
///
/// Middleware resolves a key for each inbound request and calls
/// [`check`](RateLimiter::check); the returned [`Decision`] says whether to
/// pass the request through or answer 429. Safe for concurrent use: checks
/// against the same key are serialized through the store's compare-and-swap,
/// retried up to the configured ceiling, with no lock shared across keys.
///
/// Ordinary rejection is a `Decision`, never an error. When the store cannot
/// answer (timeout, contention ceiling), the configured [`FailurePolicy`]
/// decides locally between admitting and denying, and the incident is logged.
pub struct RateLimiter {
    settings: LimiterSettings,
    strategy: Box<dyn Strategy>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter over the in-process store and the system clock.
    pub fn new(settings: LimiterSettings) -> Result<Self> {
        Self::with_parts(
            settings,
            Arc::new(MemoryStore::new()),
            Arc::new(MonotonicClock::new()),
        )
    }

    /// Create a limiter over a caller-supplied store (e.g. a shared backend).
    pub fn with_store(settings: LimiterSettings, store: Arc<dyn StateStore>) -> Result<Self> {
        Self::with_parts(settings, store, Arc::new(MonotonicClock::new()))
    }

    /// Create a limiter with every collaborator supplied. This is the
    /// constructor tests use to inject a [`crate::clock::ManualClock`].
    pub fn with_parts(
        settings: LimiterSettings,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;
        let strategy = build_strategy(&settings);
        Ok(Self {
            settings,
            strategy,
            store,
            clock,
        })
    }

    /// The configured capacity.
    pub fn limit(&self) -> u64 {
        self.strategy.capacity()
    }

    /// Check a request with the configured default cost.
    pub async fn check(&self, key: &str) -> Decision {
        self.check_cost(key, self.settings.cost).await
    }

    /// Check a request consuming `cost` permits. A cost of zero probes the
    /// current quota without consuming anything.
    pub async fn check_cost(&self, key: &str, cost: u32) -> Decision {
        trace!(key, cost, "Checking rate limit");

        for attempt in 1..=self.settings.cas_retry_limit {
            let now = self.clock.now();

            let loaded = match self.store_call(self.store.load(key)).await {
                Ok(snapshot) => snapshot,
                Err(e) => return self.apply_failure_policy(key, &e),
            };

            let expected = loaded.as_ref().map(|s| s.version);
            let outcome = self
                .strategy
                .check(loaded.as_ref().map(|s| &s.state), cost, now);

            let swap = self
                .store_call(
                    self.store
                        .compare_and_swap(key, expected, outcome.state, now),
                )
                .await;

            match swap {
                Ok(true) => {
                    if !outcome.decision.allowed {
                        debug!(
                            key,
                            remaining = outcome.decision.remaining,
                            "Rate limit exceeded"
                        );
                    }
                    return outcome.decision;
                }
                // Lost the write race; reload and recompute rather than
                // overwrite a concurrent update.
                Ok(false) => trace!(key, attempt, "Write conflict, retrying"),
                Err(e) => return self.apply_failure_policy(key, &e),
            }
        }

        let err = FloodgateError::CasContention {
            key: key.to_string(),
            attempts: self.settings.cas_retry_limit,
        };
        self.apply_failure_policy(key, &err)
    }

    /// Forget all state for a key.
    pub async fn reset(&self, key: &str) -> Result<()> {
        self.store_call(self.store.delete(key)).await
    }

    /// Run a store call under the configured timeout.
    async fn store_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.settings.store_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(FloodgateError::StoreUnavailable(format!(
                "store call exceeded {:?}",
                self.settings.store_timeout()
            ))),
        }
    }

    /// Resolve a check that the store could not serve.
    fn apply_failure_policy(&self, key: &str, err: &FloodgateError) -> Decision {
        let capacity = self.strategy.capacity();
        match self.settings.failure_policy {
            FailurePolicy::Open => {
                warn!(key, error = %err, "Store unavailable, failing open");
                Decision::allowed(capacity, capacity)
            }
            FailurePolicy::Closed => {
                warn!(key, error = %err, "Store unavailable, failing closed");
                Decision::denied(capacity, 0, self.settings.window())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StrategyKind;
    use crate::store::{KeyState, Snapshot};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Store double whose every call fails, for failure-policy tests.
    struct UnavailableStore;

    #[async_trait]
    impl StateStore for UnavailableStore {
        async fn load(&self, _key: &str) -> Result<Option<Snapshot>> {
            Err(FloodgateError::StoreUnavailable("down".to_string()))
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Option<u64>,
            _state: KeyState,
            _now: Duration,
        ) -> Result<bool> {
            Err(FloodgateError::StoreUnavailable("down".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(FloodgateError::StoreUnavailable("down".to_string()))
        }
    }

    /// Store double that never acknowledges a swap, to exhaust the retry
    /// ceiling.
    struct ContendedStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl StateStore for ContendedStore {
        async fn load(&self, key: &str) -> Result<Option<Snapshot>> {
            self.inner.load(key).await
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Option<u64>,
            _state: KeyState,
            _now: Duration,
        ) -> Result<bool> {
            Ok(false)
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    fn settings(strategy: StrategyKind, capacity: u64) -> LimiterSettings {
        LimiterSettings::new(strategy, capacity, Duration::from_secs(1))
    }

    fn manual_limiter(settings: LimiterSettings) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = RateLimiter::with_parts(
            settings,
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_at_construction() {
        let mut bad = settings(StrategyKind::TokenBucket, 1);
        bad.capacity = 0;
        assert!(matches!(
            RateLimiter::new(bad),
            Err(FloodgateError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let (limiter, _clock) = manual_limiter(settings(StrategyKind::FixedWindow, 1));

        assert!(limiter.check("alice").await.allowed);
        assert!(!limiter.check("alice").await.allowed);
        assert!(limiter.check("bob").await.allowed);
    }

    #[tokio::test]
    async fn test_default_cost_applied() {
        let mut s = settings(StrategyKind::FixedWindow, 10);
        s.cost = 4;
        let (limiter, _clock) = manual_limiter(s);

        let decision = limiter.check("k").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 6);
    }

    #[tokio::test]
    async fn test_remaining_always_within_limit() {
        for kind in [
            StrategyKind::TokenBucket,
            StrategyKind::FixedWindow,
            StrategyKind::SlidingWindow,
            StrategyKind::LeakyBucket,
        ] {
            let (limiter, clock) = manual_limiter(settings(kind, 3));
            for i in 0..10 {
                let decision = limiter.check("k").await;
                assert!(
                    decision.remaining <= 3,
                    "{:?} step {}: remaining {} out of range",
                    kind,
                    i,
                    decision.remaining
                );
                clock.advance(Duration::from_millis(100));
            }
        }
    }

    #[tokio::test]
    async fn test_reset_clears_key() {
        let (limiter, _clock) = manual_limiter(settings(StrategyKind::FixedWindow, 1));

        assert!(limiter.check("k").await.allowed);
        assert!(!limiter.check("k").await.allowed);

        limiter.reset("k").await.unwrap();
        assert!(limiter.check("k").await.allowed);
    }

    #[tokio::test]
    async fn test_fail_open_admits_when_store_down() {
        let limiter = RateLimiter::with_store(
            settings(StrategyKind::TokenBucket, 5)
                .with_failure_policy(FailurePolicy::Open),
            Arc::new(UnavailableStore),
        )
        .unwrap();

        let decision = limiter.check("k").await;
        assert!(decision.allowed);
        assert_eq!(decision.limit, 5);
    }

    #[tokio::test]
    async fn test_fail_closed_denies_when_store_down() {
        let limiter = RateLimiter::with_store(
            settings(StrategyKind::TokenBucket, 5)
                .with_failure_policy(FailurePolicy::Closed),
            Arc::new(UnavailableStore),
        )
        .unwrap();

        let decision = limiter.check("k").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_cas_exhaustion_uses_failure_policy() {
        let limiter = RateLimiter::with_store(
            settings(StrategyKind::FixedWindow, 5)
                .with_failure_policy(FailurePolicy::Closed),
            Arc::new(ContendedStore {
                inner: MemoryStore::new(),
            }),
        )
        .unwrap();

        let decision = limiter.check("k").await;
        assert!(!decision.allowed);
    }
}
