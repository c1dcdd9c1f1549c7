// src/pipeline/threadmarks.rs

use crate::error::Result;
use crate::models::Threadmark;
use crate::services::FetchRegistry;
use crate::utils::log as console;

/// List a thread's threadmarks, most recent first, numbered for `tally --threadmark`.
pub async fn run_threadmarks(registry: &FetchRegistry, url: &str) -> Result<Vec<Threadmark>> {
    console::header("Threadmarks");

    let threadmarks = registry.list_threadmarks(url).await?;
    for (i, mark) in threadmarks.iter().enumerate() {
        println!("{:>4}. {}", i + 1, mark.title);
        console::sub_item(&format!("page {}, post {}", mark.page, mark.post));
    }

    console::success(&format!("{} threadmarks", threadmarks.len()));
    Ok(threadmarks)
}
