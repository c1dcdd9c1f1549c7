//! Fetch handle responses exchanged with clients.

use serde::Serialize;

use crate::models::GroupView;

/// Returned when a fetch is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchStarted {
    pub id: u64,
}

/// Live progress of a range fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub progress_at: usize,
    pub progress_total: usize,
}

/// Answer to a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    /// The id is unknown or its handle has expired
    Missing { error: String },
    /// The fetch is known; `result` is present once it has finished
    Found(PollStatus),
}

impl PollResponse {
    pub fn missing() -> Self {
        Self::Missing {
            error: "No such fetch ID".to_string(),
        }
    }

    pub fn status(&self) -> Option<&PollStatus> {
        match self {
            Self::Found(status) => Some(status),
            Self::Missing { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    pub id: u64,
    #[serde(flatten)]
    pub progress: Progress,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<GroupView>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Set when the fetch itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}
