//! Ballot resolution and counting.
//!
//! Posts are read in thread order. Each post's `[X]` lines are resolved
//! against the ballots of authors seen so far, so a voter can write
//! `[X] plan Alice` to adopt whatever Alice last voted for. Only an
//! author's final post counts.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BallotGroup, Post, TallyResult};

/// A line carrying a ballot marker, optionally indented with dashes.
static VOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[- ]*\[X\].*").expect("valid vote regex"));

/// Leading indent and marker, captured so the indent survives.
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([- ]*)\[X\]\s*").expect("valid marker regex"));

static PLAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[X\]\s*plan\s+(\w+).*").expect("valid plan regex"));

/// `[X] <word>`, where the word may turn out to be a voter's name.
static IMPLICIT_PLAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[X\]\s+(\w+).*").expect("valid implicit plan regex"));

struct Ballot {
    text: String,
    post: Post,
    order: usize,
}

/// Running state of a tally.
#[derive(Default)]
pub struct Election {
    ballots: HashMap<String, Ballot>,
    errors: Vec<String>,
    seen: usize,
}

impl Election {
    /// Tally a whole thread range in one go.
    pub fn tally(posts: &[Post]) -> TallyResult {
        let mut election = Self::default();
        for post in posts {
            election.cast(post);
        }
        election.finish()
    }

    /// Record `post` as its author's current ballot.
    ///
    /// Replaces anything the author voted before, even when the post has
    /// no ballot lines at all.
    pub fn cast(&mut self, post: &Post) {
        let text = ballot_lines(&post.content)
            .filter_map(|line| self.resolve(line))
            .collect::<Vec<_>>()
            .join("\n");

        let order = self.seen;
        self.seen += 1;
        self.ballots.insert(
            post.author.clone(),
            Ballot {
                text,
                post: post.clone(),
                order,
            },
        );
    }

    /// Resolved text of one ballot line; `None` for a reference to an
    /// author whose ballot is empty.
    fn resolve(&mut self, line: &str) -> Option<String> {
        if let Some(caps) = PLAN_RE.captures(line) {
            return match self.ballots.get(&caps[1]) {
                Some(ballot) => non_empty(&ballot.text),
                None => {
                    self.errors.push(format!("Bad deferred vote: {line}"));
                    Some(normalize(line))
                }
            };
        }
        if let Some(ballot) = IMPLICIT_PLAN_RE
            .captures(line)
            .and_then(|caps| self.ballots.get(&caps[1]))
        {
            log::debug!("Treating {:?} as a plan reference", line);
            return non_empty(&ballot.text);
        }
        Some(normalize(line))
    }

    /// Group final ballots by text and rank by weight.
    ///
    /// Groups of equal weight keep the order in which their first member's
    /// final ballot was cast.
    pub fn finish(self) -> TallyResult {
        let mut finals: Vec<Ballot> = self.ballots.into_values().collect();
        finals.sort_by_key(|ballot| ballot.order);

        let mut ranking: Vec<BallotGroup> = Vec::new();
        let mut by_text: HashMap<String, usize> = HashMap::new();
        for ballot in finals {
            match by_text.get(&ballot.text) {
                Some(&index) => {
                    let group = &mut ranking[index];
                    group.weight += 1;
                    group.posts.push(ballot.post);
                }
                None => {
                    by_text.insert(ballot.text.clone(), ranking.len());
                    ranking.push(BallotGroup {
                        text: ballot.text,
                        weight: 1,
                        posts: vec![ballot.post],
                    });
                }
            }
        }
        ranking.sort_by_key(|group| Reverse(group.weight));

        TallyResult {
            ranking,
            errors: self.errors,
        }
    }
}

/// Ballot lines of a post, trimmed.
fn ballot_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| VOTE_RE.is_match(line))
}

/// Drop the marker, keeping dash indentation as `- `, `-- ` and so on.
fn normalize(line: &str) -> String {
    let line = line.replace('\u{a0}', " ");
    let Some(caps) = MARKER_RE.captures(&line) else {
        return line.trim().to_string();
    };
    let rest = line[caps[0].len()..].trim();
    let dashes: String = caps[1].chars().filter(|c| *c == '-').collect();
    if dashes.is_empty() {
        rest.to_string()
    } else {
        format!("{dashes} {rest}")
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
