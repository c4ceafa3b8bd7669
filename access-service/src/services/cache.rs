//! Short-lived read cache owned by the calling layer.
//!
//! Resolution functions never touch this cache; services wrap them with it.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Size above which inserts trigger a sweep of expired entries.
const SWEEP_THRESHOLD: usize = 1024;

struct Slot<V> {
    value: V,
    stored_at: Instant,
}

/// Concurrent map whose entries expire `ttl` after insertion.
///
/// Once the map holds [`SWEEP_THRESHOLD`] entries or more, inserts purge
/// expired ones, at most once per `ttl`. Cloning shares the underlying map.
pub struct TtlCache<K, V> {
    entries: Arc<DashMap<K, Slot<V>>>,
    last_sweep: Arc<Mutex<Option<Instant>>>,
    ttl: Duration,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            last_sweep: Arc::clone(&self.last_sweep),
            ttl: self.ttl,
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`; expired entries are evicted.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let expired = {
            let slot = self.entries.get(key)?;
            if now.saturating_duration_since(slot.stored_at) < self.ttl {
                return Some(slot.value.clone());
            }
            true
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        if self.entries.len() >= SWEEP_THRESHOLD && self.sweep_due(now) {
            self.purge_expired(now);
        }
        self.entries.insert(
            key,
            Slot {
                value,
                stored_at: now,
            },
        );
    }

    /// Drop every entry that has expired as of `now`.
    pub fn purge_expired(&self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, slot| now.saturating_duration_since(slot.stored_at) < ttl);
    }

    fn sweep_due(&self, now: Instant) -> bool {
        let Ok(mut last) = self.last_sweep.lock() else {
            return true;
        };
        let due = match *last {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.ttl,
        };
        if due {
            *last = Some(now);
        }
        due
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop every entry whose key matches `predicate`.
    pub fn invalidate_where<F>(&self, predicate: F)
    where
        F: Fn(&K) -> bool,
    {
        self.entries.retain(|k, _| !predicate(k));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
