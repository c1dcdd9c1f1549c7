//! Disk-backed, rate-limited document cache.
//!
//! Reads are served from the store whenever an entry exists, whatever its
//! age. Misses go to the origin through the shared [`RateLimiter`]; a
//! response that does not look like the requested kind of document is
//! retried with exponential back-off charged against the same limiter.
//! Expiry is the job of the background sweeper alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use scraper::Html;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{Config, Lifetimes, Resource};
use crate::services::{ForumSelectors, RateLimiter};
use crate::storage::DocumentStore;
use crate::utils::Fetcher;
use crate::utils::url::{decode_key, encode_key};

/// A structurally valid document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    resource: Resource,
    body: String,
}

impl Document {
    pub fn new(resource: Resource, body: impl Into<String>) -> Self {
        Self {
            resource,
            body: body.into(),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse the body. The result is not `Send`; keep it out of `.await`s.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Running cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    refetches: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub refetches: u64,
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refetches: self.refetches.load(Ordering::Relaxed),
        }
    }
}

pub struct DocumentCache {
    store: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
    selectors: ForumSelectors,
    lifetimes: Lifetimes,
    initial_backoff: u32,
    retry_budget: Option<u32>,
    stats: CacheStats,
}

impl DocumentCache {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<RateLimiter>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            store,
            fetcher,
            limiter,
            selectors: ForumSelectors::new(&config.forum)?,
            lifetimes: config.cache.lifetimes(),
            initial_backoff: config.fetch.initial_backoff.max(1),
            retry_budget: config.fetch.retry_budget(),
            stats: CacheStats::default(),
        })
    }

    pub fn selectors(&self) -> &ForumSelectors {
        &self.selectors
    }

    /// Refetches allowed per document, `None` meaning unbounded.
    pub fn retry_budget(&self) -> Option<u32> {
        self.retry_budget
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Retrieve a document, via HTTP if necessary.
    pub async fn get(&self, resource: &Resource) -> Result<Document> {
        if let Some(document) = self.cached(resource).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Cache hit: {}", resource);
            return Ok(document);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("Cache miss: {}", resource);
        self.populate(resource).await
    }

    /// Retrieve a document from the store only.
    pub async fn cached(&self, resource: &Resource) -> Option<Document> {
        let key = resource.cache_key();
        let bytes = match self.store.read(&key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", resource, e);
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(body) => Some(Document {
                resource: resource.clone(),
                body,
            }),
            Err(_) => {
                log::warn!("Cached copy of {} is not UTF-8, ignoring it", resource);
                None
            }
        }
    }

    /// Fetch from the origin until a valid document arrives or the retry
    /// budget runs out, then store it.
    async fn populate(&self, resource: &Resource) -> Result<Document> {
        let address = resource.address();
        let mut backoff = self.initial_backoff;
        let mut attempts = 0u32;

        loop {
            self.limiter.acquire().await;
            attempts += 1;
            log::info!("Fetching {}", address);

            match self.fetcher.fetch(&address).await {
                Ok(body) if self.selectors.is_valid(resource.kind(), &body) => {
                    self.persist(resource, &body).await;
                    return Ok(Document {
                        resource: resource.clone(),
                        body,
                    });
                }
                Ok(_) => log::warn!("Invalid document from {}, backing off", address),
                Err(e) => log::warn!("Error while fetching {}: {}, backing off", address, e),
            }

            if self.retry_budget.is_some_and(|budget| attempts > budget) {
                return Err(AppError::TransientFetch { address, attempts });
            }

            self.stats.refetches.fetch_add(1, Ordering::Relaxed);
            self.limiter.acquire_many(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    async fn persist(&self, resource: &Resource, body: &str) {
        if let Err(e) = self.store.write(&resource.cache_key(), body.as_bytes()).await {
            log::warn!("Could not cache {}: {}", resource, e);
        }
    }

    /// Drop one resource from the store.
    pub async fn invalidate(&self, resource: &Resource) {
        if let Err(e) = self.store.delete(&resource.cache_key()).await {
            log::warn!("Could not invalidate {}: {}", resource, e);
        }
    }

    /// Delete every entry whose address starts with `base`.
    ///
    /// Returns how many entries were removed.
    pub async fn invalidate_prefix(&self, base: &str) -> usize {
        let prefix = encode_key(base);
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Could not list cache entries: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            log::info!("Invalidating {}", decode_key(key).as_deref().unwrap_or(key));
            match self.store.delete(key).await {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not delete {}: {}", key, e),
            }
        }
        removed
    }

    /// Delete every entry older than its resource's lifetime as of `now`.
    ///
    /// Returns how many entries were removed.
    pub async fn sweep(&self, now: SystemTime) -> usize {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Sweep: could not list cache entries: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            let Some(address) = decode_key(&key) else {
                continue;
            };
            let resource = Resource::parse(&address);
            log::debug!("Sweep: considering {}", resource);

            let mtime = match self.store.modified(&key).await {
                Ok(Some(mtime)) => mtime,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Sweep: could not stat {}: {}", resource, e);
                    continue;
                }
            };
            if mtime + resource.ttl(&self.lifetimes) < now {
                log::info!("Sweep: deleting {}", resource);
                match self.store.delete(&key).await {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("Sweep: could not delete {}: {}", resource, e),
                }
            }
        }
        removed
    }

    /// Start the background sweeper, one pass every `interval`.
    ///
    /// The task holds only a weak reference: it ends on its own once the
    /// cache is dropped, or when the returned handle is stopped or dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let cache: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            log::info!("Starting cache sweeper");
            loop {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep(SystemTime::now()).await;
                if removed > 0 {
                    log::info!("Sweep removed {} expired entries", removed);
                }
                drop(cache);
                tokio::time::sleep(interval).await;
            }
        });
        SweeperHandle { task }
    }
}

/// Owns the background sweep task.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        // Drop aborts.
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{
        BASE, FakeFetcher, cache_in, index_html, page_html, test_config,
    };
    use crate::storage::DiskStore;
    use tempfile::TempDir;

    fn valid_page() -> String {
        page_html(1, 1, &[(1, "Alice", "[X] Build a boat")])
    }

    #[tokio::test]
    async fn test_second_get_is_served_from_disk() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let page = Resource::page(BASE, 1);
        fetcher.route(page.address(), vec![valid_page()]);
        let cache = cache_in(tmp.path(), fetcher.clone());

        let first = cache.get(&page).await.unwrap();
        let second = cache.get(&page).await.unwrap();

        assert_eq!(first.body(), second.body());
        assert_eq!(fetcher.calls(&page.address()), 1);
        assert_eq!(
            cache.stats(),
            CacheStatsSnapshot {
                hits: 1,
                misses: 1,
                refetches: 0
            }
        );
    }

    #[tokio::test]
    async fn test_fresh_cache_instance_reads_existing_entries() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let page = Resource::page(BASE, 1);
        fetcher.route(page.address(), vec![valid_page()]);

        cache_in(tmp.path(), fetcher.clone()).get(&page).await.unwrap();
        cache_in(tmp.path(), fetcher.clone()).get(&page).await.unwrap();

        assert_eq!(fetcher.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_responses_are_refetched() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let page = Resource::page(BASE, 1);
        fetcher.route(
            page.address(),
            vec![
                "<p>Too many requests</p>".to_string(),
                "<p>Still busy</p>".to_string(),
                valid_page(),
            ],
        );
        let cache = cache_in(tmp.path(), fetcher.clone());

        let document = cache.get(&page).await.unwrap();

        assert!(document.body().contains("Build a boat"));
        assert_eq!(fetcher.calls(&page.address()), 3);
        assert_eq!(cache.stats().refetches, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let page = Resource::page(BASE, 1);
        fetcher.route(page.address(), vec!["<p>down</p>".to_string()]);
        let cache = cache_in(tmp.path(), fetcher.clone());

        let err = cache.get(&page).await.unwrap_err();

        // One initial attempt plus three refetches.
        assert!(matches!(err, AppError::TransientFetch { attempts: 4, .. }));
        assert_eq!(fetcher.calls(&page.address()), 4);
        assert!(cache.cached(&page).await.is_none());
    }

    #[tokio::test]
    async fn test_network_errors_are_retried() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let cache = cache_in(tmp.path(), fetcher.clone());

        let err = cache.get(&Resource::index(BASE)).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(fetcher.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_misses_of_every_kind_share_one_rate_limit() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        let page = Resource::page(BASE, 1);
        let index = Resource::index(BASE);
        let generic = Resource::parse("https://forums.spacebattles.com/members/alice.7/");
        fetcher.route(page.address(), vec![valid_page()]);
        fetcher.route(index.address(), vec![index_html(&[(1, 1, "Turn 1")])]);
        fetcher.route(generic.address(), vec![valid_page()]);

        let limiter = Arc::new(RateLimiter::new(20.0));
        let interval = limiter.interval();
        let cache = DocumentCache::new(
            Arc::new(DiskStore::new(tmp.path())),
            fetcher.clone(),
            limiter,
            &test_config(),
        )
        .unwrap();

        let started = tokio::time::Instant::now();
        let (a, b, c) = tokio::join!(cache.get(&page), cache.get(&index), cache.get(&generic));
        let elapsed = started.elapsed();

        a.unwrap();
        b.unwrap();
        c.unwrap();
        assert_eq!(fetcher.total_calls(), 3);
        assert!(
            elapsed >= interval * 2,
            "three fetches took {elapsed:?}, limit interval is {interval:?}"
        );
    }

    #[tokio::test]
    async fn test_invalidate_prefix_spares_other_threads() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::new(tmp.path());
        let other = "https://forums.spacebattles.com/threads/other.2";
        for address in [
            format!("{BASE}/page-1"),
            format!("{BASE}/page-2"),
            format!("{BASE}/threadmarks"),
            format!("{other}/page-1"),
        ] {
            store.write(&encode_key(&address), b"x").await.unwrap();
        }
        let cache = cache_in(tmp.path(), FakeFetcher::new());

        let removed = cache.invalidate_prefix(BASE).await;

        assert_eq!(removed, 3);
        assert_eq!(
            store.keys().await.unwrap(),
            vec![encode_key(&format!("{other}/page-1"))]
        );
    }

    #[tokio::test]
    async fn test_sweep_uses_kind_specific_lifetimes() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::new(tmp.path());
        let page = Resource::page(BASE, 1);
        let index = Resource::index(BASE);
        store.write(&page.cache_key(), b"p").await.unwrap();
        store.write(&index.cache_key(), b"i").await.unwrap();
        let cache = cache_in(tmp.path(), FakeFetcher::new());

        // Ten minutes on: the index (5 min) is stale, the page (1 day) is not.
        let later = SystemTime::now() + Duration::from_secs(600);
        assert_eq!(cache.sweep(later).await, 1);
        assert!(cache.cached(&page).await.is_some());
        assert!(cache.cached(&index).await.is_none());

        // Two days on, the page goes too.
        let much_later = SystemTime::now() + Duration::from_secs(2 * 86_400);
        assert_eq!(cache.sweep(much_later).await, 1);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_entries() {
        let tmp = TempDir::new().unwrap();
        let store = DiskStore::new(tmp.path());
        store
            .write(&Resource::index(BASE).cache_key(), b"i")
            .await
            .unwrap();
        let cache = cache_in(tmp.path(), FakeFetcher::new());

        assert_eq!(cache.sweep(SystemTime::now()).await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_with_its_handle() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(cache_in(tmp.path(), FakeFetcher::new()));

        let handle = cache.spawn_sweeper(Duration::from_secs(60));
        assert!(handle.is_running());
        handle.stop();
    }
}
