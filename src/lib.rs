// src/lib.rs

//! Forum quest vote tally library.
//!
//! Scrapes the posts between two threadmarks of a forum thread through a
//! rate-limited disk cache, resolves deferred ballots and ranks the result.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
