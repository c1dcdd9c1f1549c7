// src/models/mod.rs

//! Domain models for the vote tally.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod ballot;
mod config;
mod fetch;
mod resource;
mod thread;

// Re-export all public types
pub use ballot::{BallotGroup, GroupView, TallyResult, VoteView};
pub use config::{
    CacheConfig, Config, FetchConfig, ForumConfig, Lifetimes, LoggingConfig, RegistryConfig,
};
pub use fetch::{FetchStarted, PollResponse, PollStatus, Progress};
pub use resource::{Resource, ResourceKind};
pub use thread::{Post, Threadmark};
