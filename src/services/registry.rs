// src/services/registry.rs

//! Background range fetches addressed by id.
//!
//! A client starts a fetch, gets an id back, and polls until the fetch is
//! done. The tally itself is computed on poll. Handles nobody has looked at
//! for a while are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Result;
use crate::models::{
    Config, FetchStarted, GroupView, Post, PollResponse, PollStatus, Threadmark,
};
use crate::services::posts_fetch::FetchProgress;
use crate::services::threadmarks::load_threadmarks;
use crate::services::{DocumentCache, Election, PostsFetch};
use crate::utils::thread_base;

type Outcome = std::result::Result<Vec<Post>, String>;

struct FetchHandle {
    progress: Arc<FetchProgress>,
    outcome: Arc<OnceLock<Outcome>>,
    task: JoinHandle<()>,
    last_access: Instant,
}

/// Owns every in-flight and finished range fetch.
pub struct FetchRegistry {
    cache: Arc<DocumentCache>,
    hosts: Vec<String>,
    max_concurrent: usize,
    ttl: Duration,
    next_id: AtomicU64,
    handles: Mutex<HashMap<u64, FetchHandle>>,
}

impl FetchRegistry {
    pub fn new(cache: Arc<DocumentCache>, config: &Config) -> Self {
        Self {
            cache,
            hosts: config.forum.hosts.clone(),
            max_concurrent: config.fetch.max_concurrent,
            ttl: Duration::from_secs(config.registry.fetch_ttl_secs),
            next_id: AtomicU64::new(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    /// Start fetching from `threadmark` to the next one in the background.
    ///
    /// Fails only if the threadmark's thread address is not acceptable.
    pub async fn start(&self, threadmark: Threadmark, force: bool) -> Result<FetchStarted> {
        let base = thread_base(&threadmark.base, &self.hosts)?;
        let fetch = PostsFetch::new(Threadmark { base, ..threadmark }, force);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let progress = fetch.progress();
        let outcome = Arc::new(OnceLock::new());
        let task = {
            let cache = Arc::clone(&self.cache);
            let outcome = Arc::clone(&outcome);
            let max_concurrent = self.max_concurrent;
            tokio::spawn(async move {
                let result = fetch.run(&cache, max_concurrent).await.map_err(|e| {
                    if e.is_transient() {
                        log::warn!("Fetch {} gave up: {}", id, e);
                    } else {
                        log::error!("Fetch {} failed: {}", id, e);
                    }
                    e.to_string()
                });
                let _ = outcome.set(result);
            })
        };

        let mut handles = self.handles.lock().await;
        self.prune(&mut handles);
        handles.insert(
            id,
            FetchHandle {
                progress,
                outcome,
                task,
                last_access: Instant::now(),
            },
        );
        log::info!("Started fetch {}", id);
        Ok(FetchStarted { id })
    }

    /// Progress of a fetch, and its tally once it has finished.
    pub async fn poll(&self, id: u64) -> PollResponse {
        let mut handles = self.handles.lock().await;
        self.prune(&mut handles);
        let Some(handle) = handles.get_mut(&id) else {
            return PollResponse::missing();
        };
        handle.last_access = Instant::now();

        let mut status = PollStatus {
            id,
            progress: handle.progress.snapshot(),
            done: false,
            result: None,
            errors: Vec::new(),
            failure: None,
        };
        // Read after the finish check: the outcome is set before the task ends.
        let finished = handle.task.is_finished();
        match handle.outcome.get() {
            None if finished => {
                status.done = true;
                status.failure = Some("fetch task ended without a result".to_string());
            }
            None => {}
            Some(Ok(posts)) => {
                let tally = Election::tally(posts);
                status.done = true;
                status.result = Some(tally.ranking.iter().map(GroupView::from).collect());
                status.errors = tally.errors;
            }
            Some(Err(failure)) => {
                status.done = true;
                status.failure = Some(failure.clone());
            }
        }
        PollResponse::Found(status)
    }

    /// Threadmarks of the thread at `url`, most recent first.
    pub async fn list_threadmarks(&self, url: &str) -> Result<Vec<Threadmark>> {
        let base = thread_base(url, &self.hosts)?;
        let mut threadmarks = load_threadmarks(&self.cache, &base).await?;
        threadmarks.reverse();
        Ok(threadmarks)
    }

    /// Number of handles currently held.
    pub async fn handle_count(&self) -> usize {
        self.handles.lock().await.len()
    }

    fn prune(&self, handles: &mut HashMap<u64, FetchHandle>) {
        handles.retain(|id, handle| {
            let keep = handle.last_access.elapsed() <= self.ttl;
            if !keep {
                log::debug!("Dropping idle fetch {}", id);
                handle.task.abort();
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RateLimiter;
    use crate::services::testing::{
        BASE, FakeFetcher, cache_in, index_html, page_html, test_config,
    };
    use crate::storage::DiskStore;
    use crate::utils::Fetcher;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct PanickingFetcher;

    #[async_trait]
    impl Fetcher for PanickingFetcher {
        async fn fetch(&self, address: &str) -> Result<String> {
            panic!("fetcher blew up on {address}");
        }
    }

    fn registry(dir: &std::path::Path, fetcher: Arc<FakeFetcher>, ttl_secs: u64) -> FetchRegistry {
        let mut config = test_config();
        config.registry.fetch_ttl_secs = ttl_secs;
        FetchRegistry::new(Arc::new(cache_in(dir, fetcher)), &config)
    }

    fn quest_fetcher() -> Arc<FakeFetcher> {
        let fetcher = FakeFetcher::new();
        fetcher.route(
            format!("{BASE}/threadmarks"),
            vec![index_html(&[(1, 1, "Turn 1"), (2, 20, "Turn 2")])],
        );
        fetcher.route(
            format!("{BASE}/page-1"),
            vec![page_html(
                1,
                2,
                &[
                    (1, "QM", "Turn one is up."),
                    (2, "A", "[X] Build a boat"),
                    (3, "B", "[X] plan A"),
                    (4, "C", "[X] Build a boat"),
                ],
            )],
        );
        fetcher.route(
            format!("{BASE}/page-2"),
            vec![page_html(2, 2, &[(20, "QM", "Turn two."), (21, "D", "[X] Swim")])],
        );
        fetcher
    }

    fn turn_one() -> Threadmark {
        Threadmark {
            base: format!("{BASE}/page-1#post-1"),
            page: 1,
            post: 1,
            title: "Turn 1".to_string(),
        }
    }

    async fn poll_until_done(registry: &FetchRegistry, id: u64) -> PollStatus {
        for _ in 0..200 {
            let response = registry.poll(id).await;
            let status = response.status().cloned().unwrap();
            if status.done {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fetch {id} never finished");
    }

    #[tokio::test]
    async fn test_fetch_then_poll_tally() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(tmp.path(), quest_fetcher(), 300);

        let started = registry.start(turn_one(), false).await.unwrap();
        let status = poll_until_done(&registry, started.id).await;

        assert_eq!(status.progress.progress_at, 2);
        assert_eq!(status.progress.progress_total, 2);
        assert!(status.failure.is_none());
        let result = status.result.unwrap();
        assert_eq!(result[0].text, "Build a boat");
        assert_eq!(result[0].weight, 3);
        let voters: Vec<&str> = result[0].votes.iter().map(|v| v.author.as_str()).collect();
        assert_eq!(voters, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_ids_are_distinct() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(tmp.path(), quest_fetcher(), 300);

        let first = registry.start(turn_one(), false).await.unwrap();
        let second = registry.start(turn_one(), false).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(registry.handle_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_id_is_missing() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(tmp.path(), quest_fetcher(), 300);

        assert_eq!(registry.poll(42).await, PollResponse::missing());
    }

    #[tokio::test]
    async fn test_idle_handles_expire() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(tmp.path(), quest_fetcher(), 0);

        let started = registry.start(turn_one(), false).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(registry.poll(started.id).await, PollResponse::missing());
        assert_eq!(registry.handle_count().await, 0);
    }

    #[tokio::test]
    async fn test_bad_thread_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(tmp.path(), quest_fetcher(), 300);
        let mark = Threadmark {
            base: "https://example.com/threads/quest.1".to_string(),
            ..turn_one()
        };

        assert!(registry.start(mark, false).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_failure() {
        let tmp = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new();
        fetcher.route(format!("{BASE}/threadmarks"), vec!["<p>down</p>".to_string()]);
        let registry = registry(tmp.path(), fetcher, 300);

        let started = registry.start(turn_one(), false).await.unwrap();
        let status = poll_until_done(&registry, started.id).await;

        assert!(status.failure.is_some());
        assert!(status.result.is_none());
    }

    #[tokio::test]
    async fn test_list_threadmarks_most_recent_first() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(tmp.path(), quest_fetcher(), 300);

        let marks = registry
            .list_threadmarks("https://forums.spacebattles.com/threads/quest.1/page-9")
            .await
            .unwrap();

        let titles: Vec<&str> = marks.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Turn 2", "Turn 1"]);
    }

    #[tokio::test]
    async fn test_panicked_fetch_is_reported_done() {
        let tmp = TempDir::new().unwrap();
        let config = test_config();
        let cache = DocumentCache::new(
            Arc::new(DiskStore::new(tmp.path())),
            Arc::new(PanickingFetcher),
            Arc::new(RateLimiter::new(1000.0)),
            &config,
        )
        .unwrap();
        let registry = FetchRegistry::new(Arc::new(cache), &config);

        let started = registry.start(turn_one(), false).await.unwrap();
        let status = poll_until_done(&registry, started.id).await;

        assert_eq!(
            status.failure.as_deref(),
            Some("fetch task ended without a result")
        );
        assert!(status.result.is_none());
    }
}
