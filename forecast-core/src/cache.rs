//! TTL-bounded memo of normalized forecasts.
//!
//! Entries are keyed by provider, rounded coordinates, and the sorted
//! parameter pairs, so two requests differing only in parameter iteration
//! order share one entry. Expired entries are evicted lazily on the next
//! lookup. Degraded results are cached exactly like successes: a transient
//! upstream outage stays sticky for the TTL, which bounds upstream call
//! volume.
//!
//! The lock is never held across the fetch await. Concurrent fetches for the
//! same cold key may race; the last writer's entry wins.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::model::CanonicalForecast;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Time source, injectable so expiry is deterministic under test.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    provider: &'static str,
    latitude: String,
    longitude: String,
    parameters: Vec<(String, String)>,
}

impl CacheKey {
    /// `BTreeMap` iteration is key-sorted, which gives the canonical pair
    /// order for free.
    pub fn new(
        provider: &'static str,
        latitude: &str,
        longitude: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            provider,
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
            parameters: parameters.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: Arc<CanonicalForecast>,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct ForecastCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for ForecastCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl, clock }
    }

    /// Return the cached forecast for `key`, or run `fetch` and cache its
    /// result for the TTL. Hits return the stored `Arc` unchanged: no
    /// re-validation, no re-timestamping. A failed fetch is not cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> anyhow::Result<Arc<CanonicalForecast>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<CanonicalForecast>>,
    {
        {
            let now = self.clock.now();
            let mut entries = self.lock_entries();
            if let Some(entry) = entries.get(&key) {
                if entry.expires_at > now {
                    return Ok(Arc::clone(&entry.value));
                }
                entries.remove(&key);
            }
        }

        let value = Arc::new(fetch().await?);

        let mut entries = self.lock_entries();
        entries.insert(
            key,
            CacheEntry { value: Arc::clone(&value), expires_at: self.clock.now() + self.ttl },
        );
        Ok(value)
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // A poisoned lock only means a fetch task panicked mid-insert; the
        // map itself is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeClock {
        now: Mutex<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self { now: Mutex::new(Instant::now()) }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().expect("clock lock") += by;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().expect("clock lock")
        }
    }

    fn forecast(marker: &str) -> CanonicalForecast {
        CanonicalForecast::new("weather.gov", "40.00", "-75.00", marker.to_string())
    }

    fn key() -> CacheKey {
        CacheKey::new("weather.gov", "40.00", "-75.00", &BTreeMap::new())
    }

    #[tokio::test]
    async fn hit_within_ttl_returns_same_arc() {
        let cache = ForecastCache::new();
        let first = cache.get_or_fetch(key(), || async { Ok(forecast("a")) }).await.expect("fetch");
        let second =
            cache.get_or_fetch(key(), || async { Ok(forecast("b")) }).await.expect("cached");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.metadata.request_urls, vec!["a"]);
        assert_eq!(first.status.requested, second.status.requested);
    }

    #[tokio::test]
    async fn expired_entry_triggers_refetch() {
        let clock = Arc::new(FakeClock::new());
        let cache = ForecastCache::with_clock(DEFAULT_TTL, clock.clone());

        let first = cache.get_or_fetch(key(), || async { Ok(forecast("a")) }).await.expect("fetch");
        clock.advance(Duration::from_secs(31));
        let second =
            cache.get_or_fetch(key(), || async { Ok(forecast("b")) }).await.expect("refetch");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.metadata.request_urls, vec!["b"]);
    }

    #[tokio::test]
    async fn entry_just_inside_ttl_is_still_served() {
        let clock = Arc::new(FakeClock::new());
        let cache = ForecastCache::with_clock(DEFAULT_TTL, clock.clone());

        cache.get_or_fetch(key(), || async { Ok(forecast("a")) }).await.expect("fetch");
        clock.advance(Duration::from_secs(29));
        let hit = cache.get_or_fetch(key(), || async { Ok(forecast("b")) }).await.expect("hit");
        assert_eq!(hit.metadata.request_urls, vec!["a"]);
    }

    #[tokio::test]
    async fn distinct_parameters_get_distinct_entries() {
        let cache = ForecastCache::new();
        let mut params = BTreeMap::new();
        params.insert("apikey".to_string(), "k1".to_string());
        let with_params = CacheKey::new("weather.gov", "40.00", "-75.00", &params);

        let a = cache.get_or_fetch(key(), || async { Ok(forecast("a")) }).await.expect("fetch");
        let b =
            cache.get_or_fetch(with_params, || async { Ok(forecast("b")) }).await.expect("fetch");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = ForecastCache::new();
        let err = cache
            .get_or_fetch(key(), || async { anyhow::bail!("upstream parse failure") })
            .await;
        assert!(err.is_err());

        let ok = cache.get_or_fetch(key(), || async { Ok(forecast("a")) }).await.expect("retries");
        assert_eq!(ok.metadata.request_urls, vec!["a"]);
    }

    #[tokio::test]
    async fn degraded_result_is_cached_like_a_success() {
        let cache = ForecastCache::new();
        let degraded = cache
            .get_or_fetch(key(), || async {
                let mut f = forecast("a");
                f.mark_http_failure(503, "a");
                Ok(f)
            })
            .await
            .expect("degraded is Ok");
        assert!(!degraded.is_success());

        let hit = cache.get_or_fetch(key(), || async { Ok(forecast("b")) }).await.expect("hit");
        assert!(Arc::ptr_eq(&degraded, &hit));
    }
}
