// src/pipeline/tally.rs

//! Tally pipeline: pick a threadmark, fetch its range, count the votes.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{PollStatus, Threadmark};
use crate::services::FetchRegistry;
use crate::utils::log as console;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Options for a single tally run.
#[derive(Debug, Clone, Default)]
pub struct TallyOptions {
    /// 1-based position in the most-recent-first listing, or a title.
    /// Defaults to the most recent threadmark.
    pub threadmark: Option<String>,
    pub force: bool,
    pub json: bool,
}

/// Tally the votes following one threadmark of the thread at `url`.
pub async fn run_tally(
    registry: &FetchRegistry,
    url: &str,
    options: &TallyOptions,
) -> Result<PollStatus> {
    console::header("Vote Tally");

    console::step(1, 3, "Loading threadmarks");
    let threadmarks = registry.list_threadmarks(url).await?;
    let start = select_threadmark(&threadmarks, options.threadmark.as_deref())?.clone();
    console::sub_item(&format!("{} (post {}, page {})", start.title, start.post, start.page));

    console::step(2, 3, "Fetching posts");
    let started = registry.start(start, options.force).await?;
    let status = wait_for(registry, started.id).await?;
    println!();

    if let Some(failure) = &status.failure {
        return Err(AppError::FetchFailed {
            id: status.id,
            reason: failure.clone(),
        });
    }

    console::step(3, 3, "Counting votes");
    if options.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_ranking(&status);
    }

    let stats = registry.cache().stats();
    let groups = status.result.as_ref().map_or(0, Vec::len);
    let voters: usize = status
        .result
        .iter()
        .flatten()
        .map(|group| group.weight)
        .sum();
    console::summary(
        "Tally complete",
        &[
            ("Pages", status.progress.progress_total.to_string()),
            ("Voters", voters.to_string()),
            ("Ballots", groups.to_string()),
            ("Errors", status.errors.len().to_string()),
            (
                "Cache",
                format!(
                    "{} hits, {} misses, {} refetches",
                    stats.hits, stats.misses, stats.refetches
                ),
            ),
        ],
    );

    Ok(status)
}

/// Poll until the fetch finishes, drawing progress as it goes.
async fn wait_for(registry: &FetchRegistry, id: u64) -> Result<PollStatus> {
    loop {
        let response = registry.poll(id).await;
        let status = response.status().cloned().ok_or(AppError::NoSuchFetch(id))?;
        console::progress(status.progress.progress_at, status.progress.progress_total);
        if status.done {
            return Ok(status);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn print_ranking(status: &PollStatus) {
    console::separator();
    for group in status.result.iter().flatten() {
        let text = if group.text.is_empty() {
            "(no vote)"
        } else {
            group.text.as_str()
        };
        println!("[{}] {}", group.weight, text.replace('\n', "\n    "));
        let voters: Vec<&str> = group.votes.iter().map(|v| v.author.as_str()).collect();
        console::sub_item(&format!("by {}", voters.join(", ")));
    }
    console::separator();
    for error in &status.errors {
        log::warn!("{}", error);
    }
}

/// Pick a threadmark from a most-recent-first listing.
fn select_threadmark<'a>(
    threadmarks: &'a [Threadmark],
    selection: Option<&str>,
) -> Result<&'a Threadmark> {
    let found = match selection {
        None => threadmarks.first(),
        Some(selection) => match selection.trim().parse::<usize>() {
            Ok(n) => n.checked_sub(1).and_then(|i| threadmarks.get(i)),
            Err(_) => threadmarks
                .iter()
                .find(|mark| mark.title.eq_ignore_ascii_case(selection.trim())),
        },
    };
    found.ok_or_else(|| {
        AppError::validation(match selection {
            Some(selection) => format!("No threadmark matches '{selection}'"),
            None => "Thread has no threadmarks".to_string(),
        })
    })
}
