//! Per-key state storage behind an optimistic-concurrency trait.
//!
//! Strategies never touch the store directly; the facade loads a versioned
//! snapshot, asks the strategy for the successor state, and writes it back
//! with [`StateStore::compare_and_swap`]. A distributed backend (Redis,
//! Memcached) is just another implementation of the same trait; the
//! strategies stay backend-agnostic.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// The mutable record the engine owns per distinct key.
///
/// One variant per strategy; each key holds exactly one variant, created
/// lazily on the first check and replaced wholesale on every admission
/// decision.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyState {
    /// Token bucket reservoir: fractional tokens plus last refill time.
    TokenBucket { tokens: f64, last_refill: Duration },
    /// Fixed window counter: aligned window start plus count consumed.
    FixedWindow { window_start: Duration, count: u64 },
    /// Sliding window log: admission timestamps with their weights,
    /// oldest first.
    SlidingWindow { log: Vec<LogEntry> },
    /// Leaky bucket queue: current level plus last leak time.
    LeakyBucket { level: f64, last_leak: Duration },
}

/// One admission recorded in a sliding window log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogEntry {
    /// When the admission happened.
    pub at: Duration,
    /// Permits it consumed.
    pub cost: u32,
}

/// A versioned view of one key's state.
///
/// The version is the CAS token: a swap succeeds only while the stored
/// version still matches the one that was loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub state: KeyState,
}

/// Storage backend for per-key limiter state.
///
/// Guarantees: `compare_and_swap` is atomic per key; absence of a key is
/// distinct from any stored state. Implementations for remote backends may
/// fail with [`crate::FloodgateError::StoreUnavailable`]; the in-process
/// store never does.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the current snapshot for a key, or `None` if the key has never
    /// been seen (or was evicted).
    async fn load(&self, key: &str) -> Result<Option<Snapshot>>;

    /// Atomically replace a key's state.
    ///
    /// `expected` is the version returned by the matching `load` (`None` to
    /// create a key that did not exist). Returns `false` if the stored
    /// version has moved in the meantime; the caller must reload and retry.
    /// `now` stamps the entry for idle-key eviction.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        state: KeyState,
        now: Duration,
    ) -> Result<bool>;

    /// Remove a key's state entirely.
    async fn delete(&self, key: &str) -> Result<()>;
}
