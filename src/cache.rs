//! # Activity cache
//! Time-boxed memoization of upstream results.
//!
//! Each operation owns one [`TtlCache`]; the key encodes the operation's
//! arguments. A per-key async lock makes concurrent callers inside the same
//! window share a single upstream fetch. Only successful values are stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;

/// Source of "now" for expiry and dedup decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().expect("manual clock mutex poisoned") = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock mutex poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("manual clock mutex poisoned")
    }
}

#[derive(Debug, Clone)]
struct Cached<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

type Slot<V> = Arc<tokio::sync::Mutex<Option<Cached<V>>>>;

/// Keyed store `key -> (value, expires_at)` with a fixed TTL.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key` if still fresh, otherwise run `fetch`
    /// and store its `Ok` result. Errors are passed through and not stored.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        // Held across the fetch: later callers for the same key wait here.
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if self.clock.now() < cached.expires_at {
                counter!("activity_cache_hits_total", "cache" => self.name).increment(1);
                tracing::debug!(cache = self.name, key, "cache hit");
                return Ok(cached.value.clone());
            }
        }

        counter!("activity_cache_misses_total", "cache" => self.name).increment(1);
        tracing::debug!(cache = self.name, key, "cache miss");

        let value = match fetch().await {
            Ok(value) => value,
            Err(e) => {
                *entry = None;
                drop(entry);
                self.release(key, &slot);
                return Err(e);
            }
        };
        *entry = Some(Cached {
            value: value.clone(),
            expires_at: self.clock.now() + self.ttl,
        });
        Ok(value)
    }

    /// Drop the entry for `key`; the next call refetches.
    pub fn invalidate(&self, key: &str) {
        self.slots
            .lock()
            .expect("cache slots mutex poisoned")
            .remove(key);
    }

    /// Number of keys currently held: fresh, in flight, or expired but not
    /// yet pruned.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("cache slots mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot for `key`. Creating a new slot first prunes idle slots that hold
    /// no fresh value, so the map only grows with keys that are live.
    fn slot(&self, key: &str) -> Slot<V> {
        let mut slots = self.slots.lock().expect("cache slots mutex poisoned");
        if let Some(slot) = slots.get(key) {
            return slot.clone();
        }

        let now = self.clock.now();
        let before = slots.len();
        slots.retain(|_, slot| {
            // Another caller holds a clone: in flight or waiting.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            slot.try_lock()
                .map(|entry| entry.as_ref().is_some_and(|c| now < c.expires_at))
                .unwrap_or(true)
        });
        let pruned = before - slots.len();
        if pruned > 0 {
            tracing::debug!(cache = self.name, pruned, "pruned idle cache slots");
        }

        slots.entry(key.to_string()).or_default().clone()
    }

    /// Forget a slot whose fetch failed, unless other callers still wait on it
    /// (the last of them to fail removes it).
    fn release(&self, key: &str, slot: &Slot<V>) {
        let mut slots = self.slots.lock().expect("cache slots mutex poisoned");
        let idle = slots
            .get(key)
            .is_some_and(|held| Arc::ptr_eq(held, slot) && Arc::strong_count(slot) == 2);
        if idle {
            slots.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn second_call_within_window_is_a_hit() {
        let clock = clock();
        let cache: TtlCache<u32> = TtlCache::new("t", Duration::seconds(60), clock.clone());
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let v: Result<u32, ()> = cache
                .get_or_try_fetch("k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(v, Ok(7));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let clock = clock();
        let cache: TtlCache<u32> = TtlCache::new("t", Duration::seconds(60), clock.clone());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = || async move { Ok::<_, ()>(calls.fetch_add(1, Ordering::SeqCst) as u32) };

        assert_eq!(cache.get_or_try_fetch("k", fetch).await, Ok(0));
        clock.advance(Duration::seconds(59));
        assert_eq!(cache.get_or_try_fetch("k", fetch).await, Ok(0));
        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get_or_try_fetch("k", fetch).await, Ok(1));
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new("t", Duration::seconds(60), clock());
        let first: Result<u32, &str> = cache.get_or_try_fetch("k", || async { Err("down") }).await;
        assert_eq!(first, Err("down"));
        let second: Result<u32, &str> = cache.get_or_try_fetch("k", || async { Ok(3) }).await;
        assert_eq!(second, Ok(3));
    }

    #[tokio::test]
    async fn failed_keys_do_not_accumulate() {
        let cache: TtlCache<u32> = TtlCache::new("t", Duration::seconds(60), clock());
        for i in 0..10_000 {
            let r: Result<u32, &str> = cache
                .get_or_try_fetch(&format!("missing/{i}"), || async { Err("404") })
                .await;
            assert!(r.is_err());
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn expired_slots_are_pruned_when_a_new_key_arrives() {
        let clock = clock();
        let cache: TtlCache<u32> = TtlCache::new("t", Duration::seconds(60), clock.clone());
        for i in 0..100 {
            let _: Result<u32, ()> = cache
                .get_or_try_fetch(&format!("k{i}"), || async move { Ok(i) })
                .await;
        }
        assert_eq!(cache.len(), 100);

        // Fresh entries survive a new key.
        let _: Result<u32, ()> = cache.get_or_try_fetch("fresh", || async { Ok(0) }).await;
        assert_eq!(cache.len(), 101);

        clock.advance(Duration::days(30));
        let _: Result<u32, ()> = cache.get_or_try_fetch("later", || async { Ok(1) }).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failure_while_others_wait_keeps_the_slot_until_they_finish() {
        let cache: TtlCache<u32> = TtlCache::new("t", Duration::seconds(60), clock());
        let (a, b) = tokio::join!(
            cache.get_or_try_fetch("k", || async {
                tokio::task::yield_now().await;
                Err::<u32, &str>("down")
            }),
            cache.get_or_try_fetch("k", || async { Ok::<u32, &str>(5) }),
        );
        assert_eq!(a, Err("down"));
        assert_eq!(b, Ok(5));
        // Served from the slot the second caller filled.
        let c: Result<u32, &str> = cache.get_or_try_fetch("k", || async { Ok(9) }).await;
        assert_eq!(c, Ok(5));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn keys_are_independent_and_invalidate_refetches() {
        let cache: TtlCache<&'static str> =
            TtlCache::new("t", Duration::seconds(60), clock());
        let a: Result<_, ()> = cache.get_or_try_fetch("a", || async { Ok("A") }).await;
        let b: Result<_, ()> = cache.get_or_try_fetch("b", || async { Ok("B") }).await;
        assert_eq!((a, b), (Ok("A"), Ok("B")));
        assert_eq!(cache.len(), 2);

        cache.invalidate("a");
        let a2: Result<_, ()> = cache.get_or_try_fetch("a", || async { Ok("A2") }).await;
        assert_eq!(a2, Ok("A2"));
    }
}
