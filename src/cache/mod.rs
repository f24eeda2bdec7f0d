//! Time-bounded, size-bounded response cache.
//!
//! Entries carry the instant they were inserted and an optional lifetime;
//! `None` means the entry never expires by age. Expired entries are
//! deleted when read and during [`collect`](ResponseCache::collect)
//! sweeps. Every effective [`set`](ResponseCache::set) defers one sweep
//! through the scheduler rather than sweeping inline, so writers never pay
//! for eviction. When a maximum entry count is configured, sweeps also
//! evict the oldest-inserted entries until the bound holds, independent of
//! age.
//!
//! Clock-sensitive operations have `_at` variants taking an explicit
//! [`Instant`] so tests control time deterministically.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tracing::debug;

use crate::scheduler::Scheduler;

#[derive(Clone, Debug)]
struct CacheEntry<T> {
    data: T,
    inserted_at: Instant,
    lifetime: Option<Duration>,
    seq: u64,
}

impl<T> CacheEntry<T> {
    fn expired_at(&self, now: Instant) -> bool {
        self.lifetime.is_some_and(|lifetime| {
            now.saturating_duration_since(self.inserted_at) >= lifetime
        })
    }
}

struct CacheInner<T> {
    entries: DashMap<String, CacheEntry<T>>,
    seq: AtomicU64,
    max_entries: Option<usize>,
    scheduler: Arc<dyn Scheduler>,
}

/// Cloneable handle to a shared response cache keyed by absolute URL.
pub struct ResponseCache<T>(Arc<CacheInner<T>>);

impl<T> Clone for ResponseCache<T> {
    fn clone(&self) -> Self { Self(Arc::clone(&self.0)) }
}

impl<T: Clone + Send + Sync + 'static> ResponseCache<T> {
    /// Create an unbounded cache.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(scheduler, None)
    }

    /// Create a cache that keeps at most `max_entries` entries, evicting
    /// the oldest-inserted first once the bound is exceeded.
    #[must_use]
    pub fn with_max_entries(scheduler: Arc<dyn Scheduler>, max_entries: usize) -> Self {
        Self::build(scheduler, Some(max_entries))
    }

    fn build(scheduler: Arc<dyn Scheduler>, max_entries: Option<usize>) -> Self {
        Self(Arc::new(CacheInner {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
            max_entries,
            scheduler,
        }))
    }

    /// Store `data` under `key` using the current time.
    ///
    /// `lifetime` of `None` never expires by age; a zero lifetime makes
    /// the call a no-op. Defers one [`collect`](ResponseCache::collect)
    /// sweep through the scheduler.
    pub fn set(&self, key: impl Into<String>, data: T, lifetime: Option<Duration>) {
        self.set_at(key, data, lifetime, Instant::now());
    }

    /// Store `data` under `key` using an explicit clock reading.
    pub fn set_at(
        &self,
        key: impl Into<String>,
        data: T,
        lifetime: Option<Duration>,
        now: Instant,
    ) {
        if lifetime.is_some_and(|lifetime| lifetime.is_zero()) {
            return;
        }
        let seq = self.0.seq.fetch_add(1, Ordering::Relaxed);
        self.0.entries.insert(
            key.into(),
            CacheEntry {
                data,
                inserted_at: now,
                lifetime,
                seq,
            },
        );
        let cache = self.clone();
        self.0
            .scheduler
            .defer(Box::new(move || cache.collect_at(Instant::now())));
    }

    /// Read `key` using the current time.
    pub fn get(&self, key: &str) -> Option<T> { self.get_at(key, Instant::now()) }

    /// Read `key` using an explicit clock reading.
    ///
    /// An entry whose age has reached its lifetime is deleted and reads as
    /// absent.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<T> {
        {
            let entry = self.0.entries.get(key)?;
            if !entry.expired_at(now) {
                return Some(entry.data.clone());
            }
        }
        debug!(key, "evicting expired cache entry on read");
        self.0.entries.remove(key);
        #[cfg(feature = "metrics")]
        crate::metrics::inc_cache_evictions(1);
        None
    }

    /// Remove `key`, if present.
    pub fn remove(&self, key: &str) { self.0.entries.remove(key); }

    /// Remove every entry.
    pub fn clear(&self) { self.0.entries.clear(); }

    /// Number of stored entries, including any not yet swept.
    #[must_use]
    pub fn len(&self) -> usize { self.0.entries.len() }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.entries.is_empty() }

    /// Sweep using the current time.
    pub fn collect(&self) { self.collect_at(Instant::now()); }

    /// Sweep using an explicit clock reading: delete expired entries, then
    /// enforce the maximum entry bound by evicting oldest-inserted first.
    pub fn collect_at(&self, now: Instant) {
        let before = self.0.entries.len();
        self.0.entries.retain(|_, entry| !entry.expired_at(now));
        let mut evicted = before - self.0.entries.len();

        if let Some(max) = self.0.max_entries {
            let excess = self.0.entries.len().saturating_sub(max);
            if excess > 0 {
                let mut order: Vec<(u64, String)> = self
                    .0
                    .entries
                    .iter()
                    .map(|entry| (entry.seq, entry.key().clone()))
                    .collect();
                order.sort_unstable_by_key(|(seq, _)| *seq);
                for (_, key) in order.into_iter().take(excess) {
                    debug!(%key, "evicting cache entry beyond the size bound");
                    self.0.entries.remove(&key);
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            debug!(evicted, "cache sweep removed entries");
            #[cfg(feature = "metrics")]
            crate::metrics::inc_cache_evictions(evicted as u64);
        }
    }
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.0.entries.len())
            .field("max_entries", &self.0.max_entries)
            .finish()
    }
}
