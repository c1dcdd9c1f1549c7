//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod url;

pub use self::http::{Fetcher, HttpFetcher};
pub use self::url::{resolve, thread_base};
