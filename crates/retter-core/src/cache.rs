//! TTL-keyed response cache.
//!
//! Grounded on the original system's `cache/Caching.go`: a flat `key ->
//! value` map paired with a `key -> timer` map of equal size, where storing
//! or resetting a key re-arms its timer.
//!
//! `Caching.go` arms each entry with `time.AfterFunc` and, on overwrite,
//! calls `timer.Stop()` followed by a drain of `timer.C` if `Stop` reports
//! the timer already fired. `AfterFunc` timers never deliver to `C`, so that
//! drain would block forever on the single racy overwrite it exists to
//! handle — not a contract worth porting. Tokio gives us a better tool:
//! every entry carries a generation counter, the spawned expiry task
//! captures the generation it was armed with, and it only evicts if that
//! generation is still current when it wakes. A concurrent `store`/`get`
//! bumps the generation and spawns a fresh task, so a stale timer firing
//! after the key has moved on is a no-op rather than a corrupted cache.
//! `JoinHandle::abort` additionally cancels the outgoing timer promptly so
//! overwritten keys don't leave a sleeping task around for the rest of the
//! TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Entry<V> {
    value: V,
    generation: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    timers: HashMap<String, JoinHandle<()>>,
    next_generation: u64,
}

/// A TTL-expiring cache keyed by route key.
///
/// Cloning a `TtlCache` shares the same backing store — it is itself a thin
/// handle around an `Arc`.
pub struct TtlCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                timers: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Stores `value` under `key`, arming (or re-arming) its TTL timer.
    pub fn store(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.lock().unwrap();
        if let Some(handle) = inner.timers.remove(&key) {
            handle.abort();
        }
        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                generation,
            },
        );
        let handle = self.spawn_expiry(key.clone(), ttl, generation);
        inner.timers.insert(key, handle);
    }

    /// Returns a clone of the value stored under `key`, optionally resetting
    /// its TTL to `ttl`.
    pub fn get(&self, key: &str, reset: bool, ttl: Duration) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let value = inner.entries.get(key)?.value.clone();
        if reset {
            if let Some(handle) = inner.timers.remove(key) {
                handle.abort();
            }
            let generation = inner.next_generation;
            inner.next_generation += 1;
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.generation = generation;
            }
            let handle = self.spawn_expiry(key.to_string(), ttl, generation);
            inner.timers.insert(key.to_string(), handle);
        }
        Some(value)
    }

    /// Removes `key` and cancels its timer, if any.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(handle) = inner.timers.remove(key) {
            handle.abort();
        }
        inner.entries.remove(key);
    }

    /// Empties the cache, cancelling every outstanding timer.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        for (_, handle) in inner.timers.drain() {
            handle.abort();
        }
        inner.entries.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of armed timers. Equal to [`TtlCache::len`] outside of the
    /// brief window inside a locked critical section.
    pub fn timer_len(&self) -> usize {
        self.inner.lock().unwrap().timers.len()
    }

    fn spawn_expiry(&self, key: String, ttl: Duration, generation: u64) -> JoinHandle<()> {
        let weak: Weak<Mutex<Inner<V>>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.lock().unwrap();
            let still_current = inner
                .entries
                .get(&key)
                .is_some_and(|e| e.generation == generation);
            if still_current {
                inner.entries.remove(&key);
                inner.timers.remove(&key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let cache: TtlCache<String> = TtlCache::new();
        cache.store("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k", false, Duration::from_secs(60)), Some("v".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.timer_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.store("k", 1, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.get("k", false, Duration::from_secs(1)), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn get_with_reset_extends_ttl() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.store("k", 1, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(6)).await;
        assert_eq!(cache.get("k", true, Duration::from_millis(10)), Some(1));
        tokio::time::advance(Duration::from_millis(6)).await;
        tokio::task::yield_now().await;
        // Original 10ms window would have lapsed at t=10ms; the reset at
        // t=6ms pushed expiry out to t=16ms, so the entry is still alive here.
        assert_eq!(cache.get("k", false, Duration::from_millis(10)), Some(1));
    }

    #[tokio::test]
    async fn remove_cancels_timer_and_drops_entry() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.store("k", 1, Duration::from_secs(60));
        cache.remove("k");
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.timer_len(), 0);
    }

    #[tokio::test]
    async fn clear_empties_both_maps() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.store("a", 1, Duration::from_secs(60));
        cache.store("b", 2, Duration::from_secs(60));
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.timer_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_cancels_stale_timer_without_evicting_fresh_value() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.store("k", 1, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(8)).await;
        cache.store("k", 2, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(8)).await;
        tokio::task::yield_now().await;
        // The first timer's deadline (t=10ms) has passed, but it was
        // superseded at t=8ms by a new generation; the value must survive.
        assert_eq!(cache.get("k", false, Duration::from_millis(10)), Some(2));
    }
}
