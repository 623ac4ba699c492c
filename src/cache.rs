use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{CacheCapacity, EvictionFraction, Method, common::duration_ms};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    method: Method,
    target: String,
}

impl CacheKey {
    pub(crate) fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
}

/// Bounded response cache with a process-wide TTL.
///
/// # Semantics
///
/// - **Lazy expiry:** an entry is fresh while `now - stored_at < ttl`; a stale
///   entry is removed by the lookup that finds it. There is no background sweep.
/// - **Live TTL:** [`CacheStore::set_ttl`] changes freshness of existing
///   entries immediately; stored instants are never rewritten.
/// - **Batch eviction:** when an insert of a new key would push the size past
///   the capacity, the oldest `fraction × capacity` entries by *stored* time
///   are evicted first. Reads do not refresh an entry's age.
///
/// The store does not look at methods beyond keying; callers only hand it
/// results that are safe to replay.
#[derive(Debug)]
pub(crate) struct CacheStore<V> {
    capacity: CacheCapacity,
    eviction_batch: usize,
    ttl_ms: AtomicU64,
    entries: DashMap<CacheKey, CacheEntry<V>>,
}

impl<V: Clone> CacheStore<V> {
    pub(crate) fn new(capacity: CacheCapacity, fraction: EvictionFraction, ttl: Duration) -> Self {
        Self {
            capacity,
            eviction_batch: fraction.batch_size(capacity),
            ttl_ms: AtomicU64::new(duration_ms(ttl)),
            entries: DashMap::new(),
        }
    } // end constructor

    pub(crate) fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms.store(duration_ms(ttl), Ordering::Relaxed);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn lookup(&self, method: Method, target: &str, now: Instant) -> Option<V> {
        let key = CacheKey::new(method, target);
        let ttl = self.ttl();

        let is_fresh = |entry: &CacheEntry<V>| now.saturating_duration_since(entry.stored_at) < ttl;

        match self.entries.get(&key) {
            None => return None,
            Some(entry) if is_fresh(entry.value()) => return Some(entry.value().value.clone()),
            // Stale: the read guard must be released before taking the write lock.
            Some(_) => {}
        }

        if self
            .entries
            .remove_if(&key, |_, entry| !is_fresh(entry))
            .is_some()
        {
            tracing::debug!(%method, key = target, "cache.expired");
        }

        None
    } // end method lookup

    pub(crate) fn store(&self, method: Method, target: &str, value: V, now: Instant) {
        let key = CacheKey::new(method, target);

        if !self.entries.contains_key(&key) && self.entries.len() + 1 > *self.capacity {
            self.evict_oldest();
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    } // end method store

    fn evict_oldest(&self) {
        let mut by_age: Vec<(Instant, CacheKey)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().stored_at, entry.key().clone()))
            .collect();

        let batch = self.eviction_batch.min(by_age.len());
        if batch == 0 {
            return;
        }

        if batch < by_age.len() {
            by_age.select_nth_unstable_by_key(batch - 1, |(stored_at, _)| *stored_at);
        }

        for (_, key) in by_age.into_iter().take(batch) {
            self.entries.remove(&key);
        }

        tracing::debug!(evicted = batch, remaining = self.entries.len(), "cache.evict");
    } // end method evict_oldest
} // end of impl
