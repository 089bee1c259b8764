//! Seams to the systems around the engine: link checking and result caching.

use crate::core::error::LinkScoutError;
use crate::types::UrlCheck;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    pub timeout: Duration,
    pub use_cache: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            use_cache: true,
        }
    }
}

/// Checks whether a URL answers over HTTP.
///
/// An `Ok` carries whatever status the server returned, including 4xx/5xx; `Err` means no
/// HTTP answer was obtained at all.
#[async_trait]
pub trait UrlValidator: Send + Sync {
    async fn validate_url(&self, url: &str, opts: CheckOptions) -> Result<UrlCheck, LinkScoutError>;
}

/// Stores link-check results between runs.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// A cached check no older than `max_age`, if any.
    async fn get(&self, url: &str, max_age: Duration) -> Option<UrlCheck>;
    async fn put(&self, url: &str, check: UrlCheck);
}

/// Cache stand-in used when no storage is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl ResultCache for NoopCache {
    async fn get(&self, _url: &str, _max_age: Duration) -> Option<UrlCheck> {
        None
    }

    async fn put(&self, _url: &str, _check: UrlCheck) {}
}

/// Process-local cache of link checks.
#[derive(Clone)]
pub struct MemoryResultCache {
    inner: moka::future::Cache<String, UrlCheck>,
}

impl MemoryResultCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: moka::future::Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MemoryResultCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(60 * 60 * 24))
    }
}

#[async_trait]
impl ResultCache for MemoryResultCache {
    async fn get(&self, url: &str, max_age: Duration) -> Option<UrlCheck> {
        let check = self.inner.get(url).await?;
        let age = chrono::Utc::now().signed_duration_since(check.timestamp);
        let max_age = chrono::Duration::from_std(max_age)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        if age > max_age {
            return None;
        }
        Some(check)
    }

    async fn put(&self, url: &str, check: UrlCheck) {
        self.inner.insert(url.to_string(), check).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn check_at(ts: chrono::DateTime<chrono::Utc>) -> UrlCheck {
        UrlCheck {
            status: 200,
            status_text: "OK".into(),
            response_time_ms: 12,
            headers: BTreeMap::new(),
            timestamp: ts,
            final_url: None,
        }
    }

    #[tokio::test]
    async fn test_memory_cache_respects_max_age() {
        let cache = MemoryResultCache::default();
        let stale = chrono::Utc::now() - chrono::Duration::hours(2);
        cache.put("https://a.test/", check_at(stale)).await;
        cache.put("https://b.test/", check_at(chrono::Utc::now())).await;

        let max_age = Duration::from_secs(3600);
        assert!(cache.get("https://a.test/", max_age).await.is_none());
        assert!(cache.get("https://b.test/", max_age).await.is_some());
        assert!(cache.get("https://c.test/", max_age).await.is_none());
    }

    #[tokio::test]
    async fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        cache.put("https://a.test/", check_at(chrono::Utc::now())).await;
        assert!(cache.get("https://a.test/", Duration::MAX).await.is_none());
    }
}
