// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::{AppError, Result};

/// Reduce a thread URL to its canonical base, `https://<host>/threads/<slug>`.
///
/// Page segments, queries and fragments are dropped. Only the given hosts are
/// accepted.
///
/// # Examples
/// ```
/// use votetally::utils::url::thread_base;
///
/// let hosts = vec!["forums.spacebattles.com".to_string()];
/// assert_eq!(
///     thread_base("https://forums.spacebattles.com/threads/quest.123/page-7#post-9", &hosts).unwrap(),
///     "https://forums.spacebattles.com/threads/quest.123"
/// );
/// ```
pub fn thread_base(address: &str, hosts: &[String]) -> Result<String> {
    let url = Url::parse(address).map_err(|e| AppError::invalid_address(address, e))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::invalid_address(address, "missing host"))?;

    if !hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
        return Err(AppError::invalid_address(
            address,
            format!("cannot parse host {host}"),
        ));
    }

    let mut dirs = url.path().split('/').skip(1);
    match (dirs.next(), dirs.next()) {
        (Some("threads"), Some(slug)) if !slug.is_empty() => {
            Ok(format!("https://{}/threads/{}", host.to_lowercase(), slug))
        }
        _ => Err(AppError::invalid_address(
            address,
            format!("can only scrape thread URLs, not {}", url.path()),
        )),
    }
}

/// Percent-encode an address into a flat storage key.
pub fn encode_key(address: &str) -> String {
    urlencoding::encode(address).into_owned()
}

/// Reverse of [`encode_key`]. Returns `None` for keys that are not valid UTF-8 once decoded.
pub fn decode_key(key: &str) -> Option<String> {
    urlencoding::decode(key).ok().map(|s| s.into_owned())
}

/// Resolve a potentially relative URL against a base URL string.
///
/// Falls back to plain concatenation when the base does not parse.
pub fn resolve(base: &str, href: &str) -> String {
    match Url::parse(base) {
        Ok(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        Err(_) => format!("{base}{href}"),
    }
}
