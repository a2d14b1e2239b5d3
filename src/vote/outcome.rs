//! Consensus rules for closing a vote.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a vote was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    /// Nobody voted
    NoVotes,
    /// Fewer ballots than `ceil(n_remaining / 2)`
    QuorumNotMet {
        /// Ballots cast
        cast: usize,
        /// Ballots needed
        required: usize,
    },
    /// More than one agent shares the highest count
    Tie {
        /// Agents sharing the lead
        leaders: Vec<String>,
        /// Their vote count
        votes: usize,
    },
    /// A single agent received the most votes
    Decided {
        /// Agent to terminate
        target: String,
        /// Votes received
        votes: usize,
    },
}

impl VoteOutcome {
    /// Agent to terminate, if the vote was decided
    pub fn terminated(&self) -> Option<&str> {
        match self {
            VoteOutcome::Decided { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteOutcome::NoVotes => write!(f, "Nobody voted. The vote has been rejected."),
            VoteOutcome::QuorumNotMet { cast, required } => write!(
                f,
                "Only {cast} vote(s) were cast but {required} were needed. The vote has been rejected."
            ),
            VoteOutcome::Tie { leaders, votes } => write!(
                f,
                "{} are tied with {votes} vote(s) each. The vote has been rejected.",
                leaders.join(", ")
            ),
            VoteOutcome::Decided { target, votes } => {
                write!(f, "{target} has been voted out with {votes} vote(s).")
            }
        }
    }
}

/// Full record of a closed vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    /// Agent that opened the vote
    pub started_by: Option<String>,
    /// Resolution
    pub outcome: VoteOutcome,
    /// Votes received per target
    pub tally: BTreeMap<String, usize>,
    /// `(voter, target)` pairs
    pub ballots: Vec<(String, String)>,
    /// Remaining agents that did not vote
    pub abstained: Vec<String>,
}

impl VoteResult {
    /// Announcement text for the chatroom
    pub fn summary(&self) -> String {
        let mut text = String::from("Voting has ended. ");
        if !self.tally.is_empty() {
            let counts: Vec<String> = self
                .tally
                .iter()
                .map(|(target, votes)| format!("{target}: {votes}"))
                .collect();
            text.push_str(&format!("Votes received: {}. ", counts.join(", ")));
        }
        if !self.abstained.is_empty() {
            text.push_str(&format!("Did not vote: {}. ", self.abstained.join(", ")));
        }
        text.push_str(&self.outcome.to_string());
        text
    }
}

/// Minimum ballots for a valid vote: `ceil(n_remaining / 2)`
pub fn quorum(n_remaining: usize) -> usize {
    (n_remaining + 1) / 2
}

/// Resolve a tally against the number of remaining agents
pub fn resolve(tally: &BTreeMap<String, usize>, n_remaining: usize) -> VoteOutcome {
    let cast: usize = tally.values().sum();
    if cast == 0 {
        return VoteOutcome::NoVotes;
    }

    let required = quorum(n_remaining);
    if cast < required {
        return VoteOutcome::QuorumNotMet { cast, required };
    }

    let votes = tally.values().copied().max().unwrap_or(0);
    let mut leaders: Vec<String> = tally
        .iter()
        .filter(|&(_, &count)| count == votes)
        .map(|(target, _)| target.clone())
        .collect();

    if leaders.len() == 1 {
        let target = leaders.remove(0);
        VoteOutcome::Decided { target, votes }
    } else {
        VoteOutcome::Tie { leaders, votes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_quorum() {
        assert_eq!(quorum(4), 2);
        assert_eq!(quorum(3), 2);
        assert_eq!(quorum(2), 1);
    }

    #[test]
    fn test_no_votes() {
        assert_eq!(resolve(&BTreeMap::new(), 4), VoteOutcome::NoVotes);
    }

    #[test]
    fn test_quorum_not_met() {
        let outcome = resolve(&tally(&[("d", 1)]), 4);
        assert_eq!(outcome, VoteOutcome::QuorumNotMet { cast: 1, required: 2 });
        assert!(outcome.terminated().is_none());
    }

    #[test]
    fn test_tie_rejected() {
        let outcome = resolve(&tally(&[("c", 2), ("d", 2)]), 4);
        assert_eq!(
            outcome,
            VoteOutcome::Tie {
                leaders: vec!["c".to_string(), "d".to_string()],
                votes: 2
            }
        );
    }

    #[test]
    fn test_decided() {
        let outcome = resolve(&tally(&[("c", 1), ("d", 3)]), 4);
        assert_eq!(outcome.terminated(), Some("d"));
    }

    #[test]
    fn test_summary_lists_abstainers() {
        let result = VoteResult {
            started_by: Some("c".to_string()),
            outcome: VoteOutcome::Decided {
                target: "d".to_string(),
                votes: 3,
            },
            tally: tally(&[("d", 3)]),
            ballots: vec![],
            abstained: vec!["d".to_string()],
        };
        let text = result.summary();
        assert!(text.contains("d: 3"));
        assert!(text.contains("Did not vote: d."));
        assert!(text.ends_with("d has been voted out with 3 vote(s)."));
    }
}
