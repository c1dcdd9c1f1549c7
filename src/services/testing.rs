//! Test doubles shared by the service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{DocumentCache, RateLimiter};
use crate::storage::DiskStore;
use crate::utils::Fetcher;

pub const BASE: &str = "https://forums.spacebattles.com/threads/quest.1";

/// Serves canned bodies per address and counts requests.
///
/// Each address has a queue of bodies; the last one repeats forever.
#[derive(Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, address: impl Into<String>, bodies: Vec<String>) {
        self.routes.lock().unwrap().insert(address.into(), bodies);
    }

    pub fn calls(&self, address: &str) -> usize {
        self.calls.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, address: &str) -> Result<String> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default() += 1;

        let mut routes = self.routes.lock().unwrap();
        let bodies = routes.get_mut(address).ok_or_else(|| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("no route for {address}"),
            ))
        })?;
        if bodies.len() > 1 {
            Ok(bodies.remove(0))
        } else {
            Ok(bodies.first().cloned().unwrap_or_default())
        }
    }
}

/// Config tuned for tests: fast limiter, tiny backoff, small retry budget.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.fetch.requests_per_second = 1000.0;
    config.fetch.initial_backoff = 1;
    config.fetch.max_refetches = 3;
    config
}

pub fn cache_in(dir: &std::path::Path, fetcher: Arc<FakeFetcher>) -> DocumentCache {
    let config = test_config();
    DocumentCache::new(
        Arc::new(DiskStore::new(dir)),
        fetcher,
        Arc::new(RateLimiter::new(config.fetch.requests_per_second)),
        &config,
    )
    .unwrap()
}

/// A message on a thread page: `(post id, author, body html)`.
pub type Message<'a> = (u64, &'a str, &'a str);

pub fn page_html(page: u32, last_page: u32, messages: &[Message<'_>]) -> String {
    let items: String = messages
        .iter()
        .map(|(id, author, body)| {
            format!(
                r#"
    <li id="post-{id}" class="message" data-author="{author}">
      <div class="messageContent">
        <article>
          <blockquote class="messageText SelectQuoteContainer ugc baseHtml">
            {body}
          </blockquote>
        </article>
      </div>
      <a href="threads/quest.1/page-{page}#post-{id}" title="Permalink" class="item muted postNumber hashPermalink OverlayTrigger">#{id}</a>
    </li>"#
            )
        })
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
<head><base href="https://forums.spacebattles.com/" /><title>Quest</title></head>
<body>
  <div class="PageNav" data-page="{page}" data-last="{last_page}"></div>
  <ol class="messageList" id="messageList">{items}
  </ol>
</body>
</html>"#
    )
}

/// Threadmark index listing `(page, post id, title)` in thread order.
pub fn index_html(marks: &[(u32, u64, &str)]) -> String {
    let items: String = marks
        .iter()
        .map(|(page, post, title)| {
            let page_part = if *page == 1 {
                String::new()
            } else {
                format!("page-{page}")
            };
            format!(
                r#"
    <li class="primaryContent threadmarkItem"><a href="threads/quest.1/{page_part}#post-{post}">{title}</a></li>"#
            )
        })
        .collect();
    format!(
        r#"<html><head><base href="https://forums.spacebattles.com/" /></head>
<body><div class="threadmarkList"><ol>{items}
</ol></div></body></html>"#
    )
}
