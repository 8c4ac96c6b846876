//! Floodgate - Multi-strategy Rate Limiting Engine
//!
//! This crate implements keyed admission control: for each inbound request,
//! middleware resolves a key (IP, API key, user id) and asks the engine
//! whether the request may proceed now, should wait, or must be rejected.
//! Four interchangeable strategies (token bucket, fixed window, sliding
//! window log, leaky bucket) share one pluggable state store accessed through
//! optimistic compare-and-swap, so checks for the same key serialize without
//! any global lock.
//!
//! ```no_run
//! use std::time::Duration;
//! use floodgate::{LimiterSettings, RateLimiter, StrategyKind};
//!
//! # async fn demo() -> floodgate::Result<()> {
//! let limiter = RateLimiter::new(LimiterSettings::new(
//!     StrategyKind::TokenBucket,
//!     100,
//!     Duration::from_secs(60),
//! ))?;
//!
//! let decision = limiter.check("203.0.113.9").await;
//! if !decision.allowed {
//!     // answer 429, Retry-After: decision.retry_after_header()
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod key;
pub mod limiter;
pub mod store;
pub mod strategy;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{FailurePolicy, LimiterConfig, LimiterSettings, StrategyKind};
pub use decision::Decision;
pub use error::{FloodgateError, Result};
pub use key::LimitKey;
pub use limiter::RateLimiter;
pub use store::{KeyState, MemoryStore, StateStore};
