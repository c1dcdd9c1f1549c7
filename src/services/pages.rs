//! Thread page scraping.
//!
//! Turns a cached thread page into [`Post`]s: quotes removed, markup reduced
//! to text with one line per line break, non-breaking spaces flattened.

use scraper::{ElementRef, Node};

use crate::error::{AppError, Result};
use crate::models::{Post, Resource};
use crate::services::{Document, DocumentCache, ForumSelectors};
use crate::utils::resolve;

/// Fetch one page and extract its posts.
///
/// A page with no readable messages is treated as a transient failure: the
/// cached copy is dropped and the page fetched again, within the cache's
/// retry budget.
pub async fn fetch_page(cache: &DocumentCache, page: &Resource) -> Result<Vec<Post>> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let document = cache.get(page).await?;
        let posts = parse_posts(&document, cache.selectors());
        if !posts.is_empty() {
            return Ok(posts);
        }

        log::warn!("No posts on {}, retrying", page);
        cache.invalidate(page).await;
        if cache.retry_budget().is_some_and(|budget| attempts > budget) {
            return Err(AppError::TransientFetch {
                address: page.address(),
                attempts,
            });
        }
    }
}

/// Extract every post on a page.
pub fn parse_posts(document: &Document, selectors: &ForumSelectors) -> Vec<Post> {
    let html = document.html();
    let page_address = document.resource().address();
    let base_href = html
        .select(&selectors.base)
        .next()
        .and_then(|base| base.value().attr("href"))
        .unwrap_or(&page_address)
        .to_string();

    html.select(&selectors.message)
        .filter_map(|message| {
            let post = parse_post(message, selectors, &base_href);
            if post.is_none() {
                log::warn!(
                    "Skipping unreadable message {:?} on {}",
                    message.value().id(),
                    page_address
                );
            }
            post
        })
        .collect()
}

fn parse_post(
    message: ElementRef<'_>,
    selectors: &ForumSelectors,
    base_href: &str,
) -> Option<Post> {
    let post = message
        .value()
        .id()?
        .strip_prefix("post-")?
        .parse()
        .ok()?;
    let author = message.value().attr("data-author")?.to_string();
    let href = message
        .select(&selectors.permalink)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(|href| resolve(base_href, href))
        .unwrap_or_default();
    let content = message
        .select(&selectors.content)
        .next()
        .map(|body| clean_text(body, &selectors.quote_class))
        .unwrap_or_default();

    Some(Post {
        href,
        content,
        post,
        author,
    })
}

/// Read the last page number from a thread's page navigation.
///
/// Threads short enough to have no navigation are a single page.
pub fn last_page(document: &Document, selectors: &ForumSelectors) -> u32 {
    document
        .html()
        .select(&selectors.page_nav)
        .next()
        .and_then(|nav| nav.value().attr("data-last"))
        .and_then(|last| last.trim().parse().ok())
        .unwrap_or(1)
}

/// Reduce a post body to plain text, skipping quote blocks.
pub fn clean_text(body: ElementRef<'_>, quote_class: &str) -> String {
    let mut raw = String::new();
    collect_text(body, quote_class, &mut raw);
    raw.split('\n')
        .map(|line| line.replace('\u{a0}', " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

fn collect_text(element: ElementRef<'_>, quote_class: &str, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_collapsed(text, out),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) if el.classes().any(|c| c == quote_class) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, quote_class, out);
                }
            }
            _ => {}
        }
    }
}

/// Append text with runs of markup whitespace folded to one space.
/// Non-breaking spaces are content and survive.
fn push_collapsed(text: &str, out: &mut String) {
    let mut in_space = out.ends_with(' ');
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
}
