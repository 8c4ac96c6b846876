//! In-process state store backed by a sharded concurrent map.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::{KeyState, Snapshot, StateStore};
use crate::clock::Clock;
use crate::error::Result;

/// One stored record: the state, its CAS version, and when it was last
/// written (for idle eviction).
#[derive(Debug, Clone)]
struct StoredEntry {
    version: u64,
    state: KeyState,
    touched: Duration,
}

/// The default in-process store.
///
/// Entries live in a sharded map; the per-shard lock taken by the entry API
/// makes each compare-and-swap atomic for its key without any global lock.
/// Idle keys are reaped by [`purge_idle`](MemoryStore::purge_idle), either
/// called directly or from the background sweeper.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every key whose last write is older than `idle_ttl` as of `now`.
    ///
    /// Returns the number of keys evicted. State for an evicted key is
    /// recreated lazily if the key shows up again, which for every strategy
    /// is equivalent to a fully refilled / empty quota.
    pub fn purge_idle(&self, now: Duration, idle_ttl: Duration) -> usize {
        // Counted inside the closure: the map can grow concurrently while
        // retain walks it, so a before/after length diff is meaningless.
        let mut evicted = 0usize;
        if let Some(cutoff) = now.checked_sub(idle_ttl) {
            self.entries.retain(|_, entry| {
                let keep = entry.touched > cutoff;
                if !keep {
                    evicted += 1;
                }
                keep
            });
        }

        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Purged idle keys");
        }
        evicted
    }

    /// Spawn a periodic eviction sweep on the current tokio runtime.
    ///
    /// Runs until the returned handle is aborted or the runtime shuts down.
    pub fn spawn_sweeper(
        store: Arc<Self>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        idle_ttl: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh store
            // isn't swept before it has seen traffic.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.purge_idle(clock.now(), idle_ttl);
            }
        })
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Snapshot>> {
        Ok(self.entries.get(key).map(|entry| Snapshot {
            version: entry.version,
            state: entry.state.clone(),
        }))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        state: KeyState,
        now: Duration,
    ) -> Result<bool> {
        let swapped = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if expected == Some(entry.version) {
                    entry.version += 1;
                    entry.state = state;
                    entry.touched = now;
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(StoredEntry {
                        version: 1,
                        state,
                        touched: now,
                    });
                    true
                } else {
                    // The key was evicted between load and swap.
                    false
                }
            }
        };

        if !swapped {
            trace!(key, "Compare-and-swap lost the race");
        }
        Ok(swapped)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
