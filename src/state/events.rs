//! Timestamped log of game events.

use serde::{Deserialize, Serialize};

use crate::chat::now_ms;
use crate::vote::VoteOutcome;

/// Something notable that happened in the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventKind {
    /// A vote was opened
    VoteStarted {
        /// Agent that opened it
        started_by: String,
        /// Opened by the human
        by_you: bool,
    },
    /// A vote was closed
    VoteEnded {
        /// Resolution
        outcome: VoteOutcome,
    },
    /// An agent was removed
    AgentTerminated {
        /// Removed agent
        agent_id: String,
    },
    /// The game finished
    GameEnded {
        /// Whether the human won
        won: bool,
    },
}

/// A logged event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// When it happened (UNIX ms)
    pub timestamp: i64,
    /// What happened
    #[serde(flatten)]
    pub kind: GameEventKind,
}

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameEventLog {
    events: Vec<GameEvent>,
}

impl GameEventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event now
    pub fn push(&mut self, kind: GameEventKind) {
        self.events.push(GameEvent {
            timestamp: now_ms(),
            kind,
        });
    }

    /// Events oldest first
    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing happened yet
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every event
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_flat() {
        let mut log = GameEventLog::new();
        log.push(GameEventKind::AgentTerminated {
            agent_id: "dave".to_string(),
        });
        let json = serde_json::to_value(&log).unwrap();
        let event = &json["events"][0];
        assert_eq!(event["type"], "agent_terminated");
        assert_eq!(event["agent_id"], "dave");
        assert!(event["timestamp"].is_i64());
    }
}
