//! Property tests for voting, message ids and agent context bounds.

use std::collections::{BTreeMap, BTreeSet};

use allms::agent::{ChatLog, LogContent, Role};
use allms::chat::{ChatMessage, MessageId, MessageIdGenerator};
use allms::vote::{quorum, resolve, AgentVoting, VoteOutcome};
use proptest::prelude::*;

const AGENTS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn arb_ballots() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..AGENTS.len(), 0..AGENTS.len()), 0..30)
}

fn arb_tally() -> impl Strategy<Value = BTreeMap<String, usize>> {
    prop::collection::btree_map(
        prop::sample::select(AGENTS.to_vec()).prop_map(str::to_string),
        1usize..6,
        0..AGENTS.len(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn message_ids_strictly_increase(n in 1usize..300) {
        let mut generator = MessageIdGenerator::new();
        let ids: Vec<MessageId> = (0..n).map(|_| generator.next_id()).collect();

        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        // Rendered ids sort the same way
        prop_assert!(ids.windows(2).all(|w| w[0].to_string() < w[1].to_string()));
        prop_assert_eq!(generator.allocated(), n as u64);
    }

    #[test]
    fn one_ballot_per_voter(ballots in arb_ballots()) {
        let mut voting = AgentVoting::new();
        prop_assert!(voting.start_vote("a"));

        let mut first_choice: BTreeMap<&str, &str> = BTreeMap::new();
        for (voter, target) in ballots {
            let (voter, target) = (AGENTS[voter], AGENTS[target]);
            let accepted = voting.vote(voter, target);
            prop_assert_eq!(accepted, !first_choice.contains_key(voter));
            first_choice.entry(voter).or_insert(target);
            prop_assert!(!voting.can_vote(voter));
        }

        prop_assert_eq!(voting.total_voters(), first_choice.len());
        prop_assert_eq!(voting.tally().values().sum::<usize>(), first_choice.len());
        for (voter, target) in &first_choice {
            prop_assert_eq!(voting.voted_for(voter), Some(*target));
        }
    }

    #[test]
    fn vote_start_is_idempotent(starters in prop::collection::vec(0..AGENTS.len(), 1..10)) {
        let mut voting = AgentVoting::new();
        let first = AGENTS[starters[0]];
        for (i, idx) in starters.iter().enumerate() {
            prop_assert_eq!(voting.start_vote(AGENTS[*idx]), i == 0);
        }
        prop_assert_eq!(voting.started_by(), Some(first));
    }

    #[test]
    fn resolution_is_consistent(tally in arb_tally(), extra in 0usize..6) {
        let cast: usize = tally.values().sum();
        let n_remaining = cast + extra;

        match resolve(&tally, n_remaining) {
            VoteOutcome::NoVotes => prop_assert_eq!(cast, 0),
            VoteOutcome::QuorumNotMet { cast: c, required } => {
                prop_assert_eq!(c, cast);
                prop_assert_eq!(required, quorum(n_remaining));
                prop_assert!(c < required);
            }
            VoteOutcome::Tie { leaders, votes } => {
                prop_assert!(cast >= quorum(n_remaining));
                prop_assert!(leaders.len() >= 2);
                for leader in &leaders {
                    prop_assert_eq!(tally[leader], votes);
                }
            }
            VoteOutcome::Decided { target, votes } => {
                prop_assert!(cast >= quorum(n_remaining));
                prop_assert_eq!(tally[&target], votes);
                prop_assert!(tally.iter().all(|(t, v)| *t == target || *v < votes));
            }
        }
    }

    #[test]
    fn early_close_always_decides(ballots in arb_ballots()) {
        let remaining: BTreeSet<String> = AGENTS.iter().map(|s| (*s).to_string()).collect();
        let mut voting = AgentVoting::new();
        voting.start_vote("a");

        for (voter, target) in ballots {
            voting.vote(AGENTS[voter], AGENTS[target]);
            if voting.max_votes_received() > remaining.len() / 2 {
                prop_assert!(voting.can_end_vote(remaining.len()));
                let result = voting.end_vote(&remaining).unwrap();
                prop_assert!(result.outcome.terminated().is_some(), "outcome: {}", result.outcome);
                break;
            }
        }
    }

    #[test]
    fn chat_log_keeps_newest_within_lookback(capacity in 1usize..40, pushes in 0u64..120) {
        let mut log = ChatLog::new(capacity);
        for i in 0..pushes {
            log.push(Role::User, LogContent::Message(MessageId::new(i)));
        }

        let expected_len = (pushes as usize).min(capacity);
        prop_assert_eq!(log.len(), expected_len);

        let kept: Vec<LogContent> = log.iter().map(|entry| entry.content.clone()).collect();
        let expected: Vec<LogContent> = (pushes - expected_len as u64..pushes)
            .map(|i| LogContent::Message(MessageId::new(i)))
            .collect();
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn deleted_messages_are_frozen(edits in prop::collection::vec(("[a-z ]{0,12}", any::<bool>()), 1..8)) {
        let mut msg = ChatMessage::new(MessageId::new(7), "original", "alice");
        prop_assert!(msg.delete(true));
        let frozen = msg.clone();

        for (text, by_you) in edits {
            prop_assert!(!msg.edit(&text, by_you));
            prop_assert!(!msg.delete(by_you));
        }
        prop_assert_eq!(msg.msg, frozen.msg);
        prop_assert_eq!(msg.history_log.len(), frozen.history_log.len());
    }
}
