//! Tally results.

use serde::Serialize;

use crate::models::Post;

/// Authors whose resolved ballots are textually identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotGroup {
    /// Resolved ballot text shared by every member
    pub text: String,

    /// Number of distinct authors in the group
    pub weight: usize,

    /// Each member's last ballot post, in post order
    pub posts: Vec<Post>,
}

/// Outcome of one tally run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyResult {
    /// Groups by descending weight
    pub ranking: Vec<BallotGroup>,

    /// Non-fatal problems met while resolving ballots
    pub errors: Vec<String>,
}

impl TallyResult {
    /// Total number of authors counted.
    pub fn voter_count(&self) -> usize {
        self.ranking.iter().map(|g| g.weight).sum()
    }
}

/// A single supporting vote as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteView {
    pub author: String,
    pub href: String,
}

/// A ballot group as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub weight: usize,
    pub text: String,
    pub votes: Vec<VoteView>,
}

impl From<&BallotGroup> for GroupView {
    fn from(group: &BallotGroup) -> Self {
        Self {
            weight: group.weight,
            text: group.text.clone(),
            votes: group
                .posts
                .iter()
                .map(|p| VoteView {
                    author: p.author.clone(),
                    href: p.href.clone(),
                })
                .collect(),
        }
    }
}
