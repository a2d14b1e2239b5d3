//! Append-only message store keyed by message id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, MessageId};
use crate::error::{GameError, Result};

/// History of every message sent in the chatroom, in id (= send) order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageHistory {
    messages: BTreeMap<MessageId, ChatMessage>,
}

impl MessageHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Ids are never reused.
    pub fn add(&mut self, message: ChatMessage) -> Result<()> {
        if self.messages.contains_key(&message.id) {
            return Err(GameError::Invariant(format!(
                "message id {} already exists in the history",
                message.id
            )));
        }
        self.messages.insert(message.id, message);
        Ok(())
    }

    /// Whether a message exists
    pub fn exists(&self, id: MessageId) -> bool {
        self.messages.contains_key(&id)
    }

    /// Get a message by id
    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.get(&id)
    }

    /// Get a message by id, treating a miss as an invariant violation
    pub fn require(&self, id: MessageId) -> Result<&ChatMessage> {
        self.messages
            .get(&id)
            .ok_or_else(|| GameError::UnknownMessage(id.to_string()))
    }

    /// Edit a message. `Ok(false)` if it was already deleted.
    pub fn edit(&mut self, id: MessageId, contents: &str, edited_by_you: bool) -> Result<bool> {
        let message = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| GameError::UnknownMessage(id.to_string()))?;
        Ok(message.edit(contents, edited_by_you))
    }

    /// Delete a message. `Ok(false)` if it was already deleted.
    pub fn delete(&mut self, id: MessageId, deleted_by_you: bool) -> Result<bool> {
        let message = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| GameError::UnknownMessage(id.to_string()))?;
        Ok(message.delete(deleted_by_you))
    }

    /// Iterate over all messages in send order
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.values()
    }

    /// All message ids in send order
    pub fn ids(&self) -> Vec<MessageId> {
        self.messages.keys().copied().collect()
    }

    /// Latest message, if any
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.values().next_back()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message
    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(n: u64) -> MessageHistory {
        let mut history = MessageHistory::new();
        for i in 0..n {
            history
                .add(ChatMessage::new(MessageId::new(i), format!("msg {i}"), "alice"))
                .unwrap();
        }
        history
    }

    #[test]
    fn test_add_and_get() {
        let history = history_with(3);
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(MessageId::new(1)).unwrap().msg, "msg 1");
        assert_eq!(history.last().unwrap().id, MessageId::new(2));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut history = history_with(1);
        let dup = ChatMessage::new(MessageId::new(0), "again", "bob");
        assert!(matches!(history.add(dup), Err(GameError::Invariant(_))));
    }

    #[test]
    fn test_edit_unknown_message() {
        let mut history = history_with(1);
        let result = history.edit(MessageId::new(99), "x", true);
        assert!(matches!(result, Err(GameError::UnknownMessage(_))));
    }

    #[test]
    fn test_delete_then_edit_is_noop() {
        let mut history = history_with(1);
        let id = MessageId::new(0);
        assert!(history.delete(id, true).unwrap());
        assert!(!history.edit(id, "changed", true).unwrap());
        assert!(!history.delete(id, false).unwrap());

        let msg = history.get(id).unwrap();
        assert_eq!(msg.history_log.len(), 1);
        assert!(msg.msg.is_empty());
    }
}
