//! Service layer for the vote tally.
//!
//! This module contains the business logic for:
//! - Rate-limited, self-healing document caching (`DocumentCache`)
//! - Thread page and threadmark scraping (`pages`, `threadmarks`)
//! - Range fetches between threadmarks (`PostsFetch`, `FetchRegistry`)
//! - Ballot resolution and counting (`Election`)

mod cache;
mod election;
pub mod pages;
mod posts_fetch;
mod rate_limiter;
mod registry;
mod selectors;
pub mod threadmarks;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStatsSnapshot, Document, DocumentCache, SweeperHandle};
pub use election::Election;
pub use posts_fetch::{FetchProgress, PostsFetch};
pub use rate_limiter::RateLimiter;
pub use registry::FetchRegistry;
pub use selectors::ForumSelectors;
