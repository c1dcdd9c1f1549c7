// src/services/posts_fetch.rs

//! Range fetch between two threadmarks.
//!
//! Pages are fetched concurrently but joined in page order, so the emitted
//! post sequence is always in thread order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Post, Progress, Resource, Threadmark};
use crate::services::pages::{fetch_page, last_page};
use crate::services::threadmarks::{following, load_threadmarks};
use crate::services::DocumentCache;

/// Live page counters, readable while the fetch runs.
#[derive(Debug, Default)]
pub struct FetchProgress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl FetchProgress {
    pub fn snapshot(&self) -> Progress {
        Progress {
            progress_at: self.done.load(Ordering::Relaxed),
            progress_total: self.total.load(Ordering::Relaxed),
        }
    }
}

/// Fetches every post from a threadmark up to the next one.
#[derive(Debug)]
pub struct PostsFetch {
    start: Threadmark,
    force: bool,
    progress: Arc<FetchProgress>,
}

impl PostsFetch {
    pub fn new(start: Threadmark, force: bool) -> Self {
        Self {
            start,
            force,
            progress: Arc::new(FetchProgress::default()),
        }
    }

    pub fn start(&self) -> &Threadmark {
        &self.start
    }

    /// Shared handle to the counters, for pollers.
    pub fn progress(&self) -> Arc<FetchProgress> {
        Arc::clone(&self.progress)
    }

    /// Fetch and trim the range, at most `max_concurrent` pages in flight.
    pub async fn run(&self, cache: &DocumentCache, max_concurrent: usize) -> Result<Vec<Post>> {
        let base = self.start.base.as_str();
        if self.force {
            let removed = cache.invalidate_prefix(base).await;
            log::info!("Forced refresh of {}: dropped {} cached documents", base, removed);
        }

        let threadmarks = load_threadmarks(cache, base).await?;
        let stop = following(&threadmarks, self.start.post).cloned();
        let last = match &stop {
            Some(stop) => stop.page,
            None => {
                let first = cache.get(&Resource::page(base, 1)).await?;
                last_page(&first, cache.selectors())
            }
        };

        let first = self.start.page;
        let pages: Vec<u32> = (first..=last.max(first)).collect();
        self.progress.total.store(pages.len(), Ordering::Relaxed);
        log::info!(
            "Fetching {} pages of {} from post {} ({})",
            pages.len(),
            base,
            self.start.post,
            stop.as_ref()
                .map_or_else(|| "to end".to_string(), |s| format!("until post {}", s.post))
        );

        let mut page_stream = stream::iter(pages)
            .map(|page| async move {
                let posts = fetch_page(cache, &Resource::page(base, page)).await;
                (page, posts)
            })
            .buffered(max_concurrent.max(1));

        let mut collected = Vec::new();
        while let Some((page, posts)) = page_stream.next().await {
            let posts = posts?;
            collected.extend(posts.into_iter().filter(|post| {
                (page != first || post.post >= self.start.post)
                    && stop.as_ref().is_none_or(|stop| post.post < stop.post)
            }));
            self.progress.done.fetch_add(1, Ordering::Relaxed);
        }

        log::info!("Collected {} posts from {}", collected.len(), base);
        Ok(collected)
    }
}
