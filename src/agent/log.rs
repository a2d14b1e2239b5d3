//! Bounded rolling chat log used as LLM context.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::chat::MessageId;

/// Conversation role of a log entry, as understood by chat completion APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and notifications
    System,
    /// Messages from other agents
    User,
    /// The agent's own messages
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Content of a log entry.
///
/// Chat messages are stored by id and resolved at request time so edits and
/// deletes show up in later turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LogContent {
    /// Free text (notifications, announcements)
    Text(String),
    /// Reference to a chat message
    Message(MessageId),
}

/// One entry of an agent's chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    /// Role the entry is presented with
    pub role: Role,
    /// Text or message reference
    pub content: LogContent,
}

/// FIFO of log entries that silently evicts the oldest beyond its capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLog {
    entries: VecDeque<ChatLogEntry>,
    capacity: usize,
}

impl ChatLog {
    /// Create an empty log holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest if full
    pub fn push(&mut self, role: Role, content: LogContent) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ChatLogEntry { role, content });
    }

    /// Change the bound, truncating from the front if needed
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&ChatLogEntry> {
        self.entries.back()
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ChatLogEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut log = ChatLog::new(2);
        log.push(Role::User, LogContent::Message(MessageId::new(0)));
        log.push(Role::User, LogContent::Message(MessageId::new(1)));
        log.push(Role::System, LogContent::Text("note".to_string()));

        assert_eq!(log.len(), 2);
        let first = log.iter().next().unwrap();
        assert_eq!(first.content, LogContent::Message(MessageId::new(1)));
        assert_eq!(log.last().unwrap().role, Role::System);
    }

    #[test]
    fn test_shrink_capacity() {
        let mut log = ChatLog::new(5);
        for i in 0..5 {
            log.push(Role::User, LogContent::Message(MessageId::new(i)));
        }
        log.set_capacity(3);
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.iter().next().unwrap().content,
            LogContent::Message(MessageId::new(2))
        );
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut log = ChatLog::new(0);
        log.push(Role::User, LogContent::Text("x".to_string()));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(Role::Assistant.as_str(), "assistant");
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }
}
