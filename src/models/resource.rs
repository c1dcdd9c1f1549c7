//! Cacheable forum resources.
//!
//! Every address the cache stores is classified into exactly one
//! [`Resource`] variant, which fixes both how a response is validated and
//! how long it may live on disk.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::models::Lifetimes;
use crate::utils::url::encode_key;

static PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)/page-([0-9]+)$").expect("valid page regex"));

const INDEX_SUFFIX: &str = "/threadmarks";

/// A remote document the cache knows how to store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// One page of a thread
    Page { base: String, page: u32 },
    /// A thread's threadmark index
    Index { base: String },
    /// Anything else
    Generic { address: String },
}

/// What a valid response must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Page,
    Index,
    Generic,
}

impl Resource {
    pub fn page(base: impl Into<String>, page: u32) -> Self {
        Self::Page {
            base: base.into(),
            page,
        }
    }

    pub fn index(base: impl Into<String>) -> Self {
        Self::Index { base: base.into() }
    }

    /// Classify a bare address. Total: every string maps to one variant.
    pub fn parse(address: &str) -> Self {
        if let Some(base) = address.strip_suffix(INDEX_SUFFIX) {
            return Self::index(base);
        }
        if let Some(caps) = PAGE_RE.captures(address) {
            if let Ok(page) = caps[2].parse() {
                return Self::page(&caps[1], page);
            }
        }
        Self::Generic {
            address: address.to_string(),
        }
    }

    /// Canonical address fetched from the origin.
    pub fn address(&self) -> String {
        match self {
            Self::Page { base, page } => format!("{base}/page-{page}"),
            Self::Index { base } => format!("{base}{INDEX_SUFFIX}"),
            Self::Generic { address } => address.clone(),
        }
    }

    /// Storage key: the percent-encoded address.
    pub fn cache_key(&self) -> String {
        encode_key(&self.address())
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Page { .. } => ResourceKind::Page,
            Self::Index { .. } => ResourceKind::Index,
            Self::Generic { .. } => ResourceKind::Generic,
        }
    }

    /// How long a stored copy stays valid.
    pub fn ttl(&self, lifetimes: &Lifetimes) -> Duration {
        match self.kind() {
            ResourceKind::Page => lifetimes.page,
            ResourceKind::Index => lifetimes.index,
            ResourceKind::Generic => lifetimes.generic,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}
