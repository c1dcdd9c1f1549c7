//! Local filesystem storage implementation.
//!
//! One file per key directly under the root directory. Writes go to a
//! hidden temporary file first and are renamed into place, so readers never
//! observe a half-written document. Hidden files are not keys.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::DocumentStore;

/// Distinguishes temporary files of concurrent writes to the same key.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root_dir: PathBuf,
}

impl DiskStore {
    /// Create a new DiskStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Create the root directory if needed.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root_dir);
        tokio::fs::create_dir_all(&store.root_dir).await?;
        Ok(store)
    }

    pub fn root(&self) -> &PathBuf {
        &self.root_dir
    }

    /// Get the full path for a key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// A temporary path no other write, in this process or another, shares.
    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root_dir
            .join(format!(".{key}.{}.{seq}.partial", std::process::id()))
    }
}

fn not_found<T>(result: std::io::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[async_trait]
impl DocumentStore for DiskStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = self.temp_path(key);
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&tmp, self.path(key)).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        not_found(tokio::fs::read(self.path(key)).await)
    }

    async fn modified(&self, key: &str) -> Result<Option<SystemTime>> {
        match not_found(tokio::fs::metadata(self.path(key)).await)? {
            Some(meta) => Ok(Some(meta.modified()?)),
            None => Ok(None),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = match not_found(tokio::fs::read_dir(&self.root_dir).await)? {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        not_found(tokio::fs::remove_file(self.path(key)).await)?;
        Ok(())
    }
}
