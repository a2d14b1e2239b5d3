//! Vote tally and consensus.
//!
//! Only one vote is open at a time. Every remaining agent casts at most one
//! ballot per round, and `sum(result_map) == len(vote_map)` always holds.
//!
//! A vote may close early once everyone has voted or the leader holds a
//! strict majority (`max > floor(n / 2)`). On close, the outcome is resolved
//! by [`resolve`]:
//!
//! | Condition                         | Outcome                   |
//! |-----------------------------------|---------------------------|
//! | no ballots                        | [`VoteOutcome::NoVotes`]  |
//! | fewer than `ceil(n / 2)` ballots  | [`VoteOutcome::QuorumNotMet`] |
//! | several agents share the maximum  | [`VoteOutcome::Tie`]      |
//! | single strict maximum             | [`VoteOutcome::Decided`]  |

mod outcome;

pub use outcome::{quorum, resolve, VoteOutcome, VoteResult};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Tally for the current vote round
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentVoting {
    vote_map: BTreeMap<String, String>,
    result_map: BTreeMap<String, usize>,
    started: bool,
    started_by: Option<String>,
}

impl AgentVoting {
    /// Create a closed tally
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a vote. Returns `false` if one is already open.
    pub fn start_vote(&mut self, started_by: &str) -> bool {
        if self.started {
            return false;
        }
        self.vote_map.clear();
        self.result_map.clear();
        self.started = true;
        self.started_by = Some(started_by.to_string());
        true
    }

    /// Whether a vote is open
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Who opened the current vote
    pub fn started_by(&self) -> Option<&str> {
        self.started_by.as_deref()
    }

    /// Whether `voter` may still cast a ballot
    pub fn can_vote(&self, voter: &str) -> bool {
        self.started && !self.vote_map.contains_key(voter)
    }

    /// Cast a ballot. Returns `false` if no vote is open or `voter` already voted.
    pub fn vote(&mut self, voter: &str, target: &str) -> bool {
        if !self.can_vote(voter) {
            return false;
        }
        self.vote_map.insert(voter.to_string(), target.to_string());
        *self.result_map.entry(target.to_string()).or_insert(0) += 1;
        true
    }

    /// Target of `voter`'s ballot in the current round
    pub fn voted_for(&self, voter: &str) -> Option<&str> {
        self.vote_map.get(voter).map(String::as_str)
    }

    /// Number of ballots cast
    pub fn total_voters(&self) -> usize {
        self.vote_map.len()
    }

    /// Highest count any target received
    pub fn max_votes_received(&self) -> usize {
        self.result_map.values().copied().max().unwrap_or(0)
    }

    /// Votes received per target
    pub fn tally(&self) -> &BTreeMap<String, usize> {
        &self.result_map
    }

    /// Whether the open vote can close early
    pub fn can_end_vote(&self, n_remaining: usize) -> bool {
        if !self.started {
            return false;
        }
        self.total_voters() >= n_remaining || self.max_votes_received() > n_remaining / 2
    }

    /// Close the vote and resolve it against the remaining agents.
    ///
    /// Returns `None` if no vote was open.
    pub fn end_vote(&mut self, remaining: &BTreeSet<String>) -> Option<VoteResult> {
        if !self.started {
            return None;
        }
        self.started = false;

        let tally = std::mem::take(&mut self.result_map);
        let vote_map = std::mem::take(&mut self.vote_map);
        let outcome = resolve(&tally, remaining.len());
        let abstained = remaining
            .iter()
            .filter(|id| !vote_map.contains_key(*id))
            .cloned()
            .collect();

        Some(VoteResult {
            started_by: self.started_by.take(),
            outcome,
            tally,
            ballots: vote_map.into_iter().collect(),
            abstained,
        })
    }

    /// Drop any open vote without resolving it
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remaining(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut voting = AgentVoting::new();
        assert!(voting.start_vote("a"));
        assert!(!voting.start_vote("b"));
        assert_eq!(voting.started_by(), Some("a"));
    }

    #[test]
    fn test_one_ballot_per_voter() {
        let mut voting = AgentVoting::new();
        assert!(!voting.vote("a", "b"));

        voting.start_vote("a");
        assert!(voting.vote("a", "b"));
        assert!(!voting.vote("a", "c"));
        assert_eq!(voting.voted_for("a"), Some("b"));
        assert_eq!(voting.total_voters(), 1);
        assert_eq!(voting.tally().values().sum::<usize>(), 1);
    }

    #[test]
    fn test_can_end_on_majority() {
        let mut voting = AgentVoting::new();
        voting.start_vote("c");
        voting.vote("a", "d");
        voting.vote("b", "d");
        // 2 of 4 is not a strict majority
        assert!(!voting.can_end_vote(4));
        voting.vote("c", "d");
        assert!(voting.can_end_vote(4));
    }

    #[test]
    fn test_can_end_when_all_voted() {
        let mut voting = AgentVoting::new();
        voting.start_vote("a");
        voting.vote("a", "b");
        voting.vote("b", "a");
        assert!(voting.can_end_vote(2));
    }

    #[test]
    fn test_end_vote_resolves_and_resets() {
        let mut voting = AgentVoting::new();
        assert!(voting.end_vote(&remaining(&["a"])).is_none());

        voting.start_vote("c");
        voting.vote("a", "d");
        voting.vote("b", "d");
        voting.vote("c", "d");

        let result = voting.end_vote(&remaining(&["a", "b", "c", "d"])).unwrap();
        assert_eq!(result.outcome.terminated(), Some("d"));
        assert_eq!(result.abstained, vec!["d".to_string()]);
        assert_eq!(result.ballots.len(), 3);
        assert_eq!(result.started_by.as_deref(), Some("c"));

        assert!(!voting.has_started());
        assert_eq!(voting.total_voters(), 0);
        assert!(voting.start_vote("a"));
    }
}
