//! Threadmark index scraping.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::models::{Resource, Threadmark};
use crate::services::{Document, DocumentCache, ForumSelectors};

static POST_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"threads/[^/]+/(?:page-([0-9]+))?#post-([0-9]+)").expect("valid href regex")
});

/// Load a thread's threadmarks, in thread order.
pub async fn load_threadmarks(cache: &DocumentCache, base: &str) -> Result<Vec<Threadmark>> {
    let document = cache.get(&Resource::index(base)).await?;
    Ok(parse_threadmarks(&document, cache.selectors(), base))
}

/// Extract threadmarks from an index document.
///
/// Links that do not point at a post are skipped.
pub fn parse_threadmarks(
    document: &Document,
    selectors: &ForumSelectors,
    base: &str,
) -> Vec<Threadmark> {
    document
        .html()
        .select(&selectors.threadmark)
        .filter_map(|link| {
            let href = link.value().attr("href").unwrap_or_default();
            let title = link.text().collect::<String>().trim().to_string();
            let threadmark = parse_href(href).map(|(page, post)| Threadmark {
                base: base.to_string(),
                page,
                post,
                title,
            });
            if threadmark.is_none() {
                log::warn!("Bad threadmark: {}", href);
            }
            threadmark
        })
        .collect()
}

/// `(page, post)` from a threadmark link; page defaults to 1.
fn parse_href(href: &str) -> Option<(u32, u64)> {
    let caps = POST_HREF_RE.captures(href)?;
    let page = match caps.get(1) {
        Some(page) => page.as_str().parse().ok()?,
        None => 1,
    };
    let post = caps[2].parse().ok()?;
    Some((page, post))
}

/// The threadmark right after the one at `post`, if any.
///
/// If `post` is not a known threadmark there is no following one either.
pub fn following<'a>(threadmarks: &'a [Threadmark], post: u64) -> Option<&'a Threadmark> {
    threadmarks
        .iter()
        .skip_while(|mark| mark.post != post)
        .nth(1)
}
