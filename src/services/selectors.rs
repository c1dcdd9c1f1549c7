//! Compiled CSS selectors for forum markup.

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ForumConfig, ResourceKind};

/// Selectors for thread pages and threadmark indexes, parsed once.
#[derive(Debug, Clone)]
pub struct ForumSelectors {
    pub message: Selector,
    pub content: Selector,
    pub permalink: Selector,
    pub page_nav: Selector,
    pub threadmark: Selector,
    pub base: Selector,
    pub quote_class: String,
}

impl ForumSelectors {
    pub fn new(config: &ForumConfig) -> Result<Self> {
        Ok(Self {
            message: parse_selector(&config.message_selector)?,
            content: parse_selector(&config.content_selector)?,
            permalink: parse_selector(&config.permalink_selector)?,
            page_nav: parse_selector(&config.page_nav_selector)?,
            threadmark: parse_selector(&config.threadmark_selector)?,
            base: parse_selector("head base")?,
            quote_class: config.quote_class.clone(),
        })
    }

    /// Whether a response body is structurally usable for its kind.
    ///
    /// Pages need at least one message, indexes at least one threadmark;
    /// generic documents are accepted if they look like either.
    pub fn is_valid(&self, kind: ResourceKind, body: &str) -> bool {
        let document = Html::parse_document(body);
        let has = |selector: &Selector| document.select(selector).next().is_some();
        match kind {
            ResourceKind::Page => has(&self.message),
            ResourceKind::Index => has(&self.threadmark),
            ResourceKind::Generic => has(&self.message) || has(&self.threadmark),
        }
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
