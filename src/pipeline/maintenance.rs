// src/pipeline/maintenance.rs

//! Cache housekeeping entry points.

use std::time::SystemTime;

use crate::error::Result;
use crate::services::DocumentCache;
use crate::utils::log as console;
use crate::utils::thread_base;

/// Drop every cached document of the thread at `url`.
pub async fn run_invalidate(cache: &DocumentCache, hosts: &[String], url: &str) -> Result<usize> {
    let base = thread_base(url, hosts)?;
    console::header("Invalidate");
    console::sub_item(&base);

    let removed = cache.invalidate_prefix(&base).await;
    console::success(&format!("Removed {} cached documents", removed));
    Ok(removed)
}

/// Run one sweep pass now instead of waiting for the background sweeper.
pub async fn run_sweep(cache: &DocumentCache) -> Result<usize> {
    console::header("Sweep");

    let removed = cache.sweep(SystemTime::now()).await;
    console::success(&format!("Removed {} expired documents", removed));
    Ok(removed)
}
