//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// On-disk document cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP and rate limiting behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Recognized forums and the selectors used to scrape them
    #[serde(default)]
    pub forum: ForumConfig,

    /// Fetch handle bookkeeping
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if !(self.fetch.requests_per_second > 0.0) {
            return Err(AppError::validation(
                "fetch.requests_per_second must be > 0",
            ));
        }
        if self.fetch.initial_backoff == 0 {
            return Err(AppError::validation("fetch.initial_backoff must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(AppError::validation("cache.sweep_interval_secs must be > 0"));
        }
        if self.forum.hosts.is_empty() {
            return Err(AppError::config("No forum hosts defined"));
        }
        for selector in self.forum.selectors() {
            Selector::parse(selector)
                .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        Ok(())
    }
}

/// On-disk document cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding one file per cached address
    #[serde(default = "defaults::cache_dir")]
    pub dir: PathBuf,

    /// Seconds between background sweeps
    #[serde(default = "defaults::sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Lifetime of a thread page
    #[serde(default = "defaults::page_ttl")]
    pub page_ttl_secs: u64,

    /// Lifetime of a threadmark index
    #[serde(default = "defaults::short_ttl")]
    pub index_ttl_secs: u64,

    /// Lifetime of anything else
    #[serde(default = "defaults::short_ttl")]
    pub generic_ttl_secs: u64,
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Lifetimes handed to the resource locator.
    pub fn lifetimes(&self) -> Lifetimes {
        Lifetimes {
            page: Duration::from_secs(self.page_ttl_secs),
            index: Duration::from_secs(self.index_ttl_secs),
            generic: Duration::from_secs(self.generic_ttl_secs),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: defaults::cache_dir(),
            sweep_interval_secs: defaults::sweep_interval(),
            page_ttl_secs: defaults::page_ttl(),
            index_ttl_secs: defaults::short_ttl(),
            generic_ttl_secs: defaults::short_ttl(),
        }
    }
}

/// Per-kind cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetimes {
    pub page: Duration,
    pub index: Duration,
    pub generic: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        CacheConfig::default().lifetimes()
    }
}

/// HTTP client and rate limiting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Global outbound request rate, shared by every fetch
    #[serde(default = "defaults::requests_per_second")]
    pub requests_per_second: f64,

    /// Permits charged before the first refetch; doubles on each retry
    #[serde(default = "defaults::initial_backoff")]
    pub initial_backoff: u32,

    /// Refetches allowed per document before giving up (0 = never give up)
    #[serde(default = "defaults::max_refetches")]
    pub max_refetches: u32,

    /// Maximum pages fetched at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl FetchConfig {
    /// Retry budget, `None` meaning unbounded.
    pub fn retry_budget(&self) -> Option<u32> {
        (self.max_refetches > 0).then_some(self.max_refetches)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            requests_per_second: defaults::requests_per_second(),
            initial_backoff: defaults::initial_backoff(),
            max_refetches: defaults::max_refetches(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Recognized forums and their markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumConfig {
    /// Hosts whose thread URLs are accepted
    #[serde(default = "defaults::hosts")]
    pub hosts: Vec<String>,

    /// One element per post on a thread page
    #[serde(default = "defaults::message_selector")]
    pub message_selector: String,

    /// Post body within a message
    #[serde(default = "defaults::content_selector")]
    pub content_selector: String,

    /// Quoted posts inside a body, dropped before tallying
    #[serde(default = "defaults::quote_class")]
    pub quote_class: String,

    /// Post permalink within a message
    #[serde(default = "defaults::permalink_selector")]
    pub permalink_selector: String,

    /// Page navigation carrying the `data-last` attribute
    #[serde(default = "defaults::page_nav_selector")]
    pub page_nav_selector: String,

    /// Threadmark links on the threadmark index
    #[serde(default = "defaults::threadmark_selector")]
    pub threadmark_selector: String,
}

impl ForumConfig {
    /// Every CSS selector in this section.
    pub fn selectors(&self) -> [&str; 5] {
        [
            &self.message_selector,
            &self.content_selector,
            &self.permalink_selector,
            &self.page_nav_selector,
            &self.threadmark_selector,
        ]
    }
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            hosts: defaults::hosts(),
            message_selector: defaults::message_selector(),
            content_selector: defaults::content_selector(),
            quote_class: defaults::quote_class(),
            permalink_selector: defaults::permalink_selector(),
            page_nav_selector: defaults::page_nav_selector(),
            threadmark_selector: defaults::threadmark_selector(),
        }
    }
}

/// Fetch handle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Seconds a fetch handle survives without being polled
    #[serde(default = "defaults::short_ttl")]
    pub fetch_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            fetch_ttl_secs: defaults::short_ttl(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Cache defaults
    pub fn cache_dir() -> PathBuf {
        PathBuf::from("/tmp/svcache")
    }
    pub fn sweep_interval() -> u64 {
        60
    }
    pub fn page_ttl() -> u64 {
        86_400
    }
    pub fn short_ttl() -> u64 {
        300
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "SVQuestValet".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn requests_per_second() -> f64 {
        2.0
    }
    pub fn initial_backoff() -> u32 {
        4
    }
    pub fn max_refetches() -> u32 {
        8
    }
    pub fn max_concurrent() -> usize {
        8
    }

    // Forum defaults
    pub fn hosts() -> Vec<String> {
        vec![
            "forums.sufficientvelocity.com".into(),
            "forums.spacebattles.com".into(),
        ]
    }
    pub fn message_selector() -> String {
        ".message".into()
    }
    pub fn content_selector() -> String {
        ".messageText".into()
    }
    pub fn quote_class() -> String {
        "bbCodeQuote".into()
    }
    pub fn permalink_selector() -> String {
        ".hashPermalink".into()
    }
    pub fn page_nav_selector() -> String {
        ".PageNav".into()
    }
    pub fn threadmark_selector() -> String {
        ".threadmarkItem a".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
