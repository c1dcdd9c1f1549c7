//! Storage abstractions for cached documents.
//!
//! The cache keeps one flat entry per remote address. Keys are
//! percent-encoded addresses, so they never contain path separators.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── https%3A%2F%2Fforums.spacebattles.com%2Fthreads%2Fq.1%2Fthreadmarks
//! ├── https%3A%2F%2Fforums.spacebattles.com%2Fthreads%2Fq.1%2Fpage-1
//! └── https%3A%2F%2Fforums.spacebattles.com%2Fthreads%2Fq.1%2Fpage-2
//! ```

pub mod local;

use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::DiskStore;

/// A key-value byte store on stable storage.
///
/// Concurrent access to different keys is safe. Concurrent writes to the
/// same key are last-writer-wins; no transactional guarantee is made.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write an entry, replacing any previous one.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read an entry, returning `None` if it doesn't exist.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Last modification time of an entry.
    async fn modified(&self, key: &str) -> Result<Option<SystemTime>>;

    /// Every key currently stored.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Delete an entry. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
