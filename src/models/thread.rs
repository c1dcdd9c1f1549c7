//! Threadmarks and posts scraped from a forum thread.

use serde::{Deserialize, Serialize};

/// An author-curated bookmark into a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threadmark {
    /// Canonical thread base, `https://<host>/threads/<slug>`
    pub base: String,

    /// Page the marked post sits on
    pub page: u32,

    /// Id of the marked post
    pub post: u64,

    /// Threadmark title as displayed on the index
    pub title: String,
}

/// One post on a thread page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Absolute permalink
    pub href: String,

    /// Plain text body with quotes removed, one line per line break
    pub content: String,

    /// Post id, unique and increasing within a thread
    pub post: u64,

    /// Display name of the author
    pub author: String,
}
