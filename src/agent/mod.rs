//! Chatroom participants.
//!
//! An [`Agent`] holds a persona, the ids of the messages it sent, a DM index
//! keyed by counterpart, and a bounded [`ChatLog`] that becomes the LLM
//! context for its next turn. The human's agent has the same shape; it simply
//! never runs a chat loop.

mod log;

pub use log::{ChatLog, ChatLogEntry, LogContent, Role};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::MessageId;

/// A chatroom participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent id (also its display name)
    pub id: String,
    persona: String,
    msg_ids: BTreeSet<MessageId>,
    dm_msg_ids_recv: BTreeMap<String, BTreeSet<MessageId>>,
    dm_msg_ids_sent: BTreeMap<String, BTreeSet<MessageId>>,
    chat_logs: ChatLog,
}

impl Agent {
    /// Create an agent whose chat log keeps at most `max_lookback` entries
    pub fn new(id: impl Into<String>, persona: impl Into<String>, max_lookback: usize) -> Self {
        Self {
            id: id.into(),
            persona: persona.into(),
            msg_ids: BTreeSet::new(),
            dm_msg_ids_recv: BTreeMap::new(),
            dm_msg_ids_sent: BTreeMap::new(),
            chat_logs: ChatLog::new(max_lookback),
        }
    }

    /// Persona text
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Replace the persona
    pub fn update_persona(&mut self, persona: impl Into<String>) {
        self.persona = persona.into();
    }

    /// Record a message sent by this agent
    pub fn add_message_id(&mut self, id: MessageId) {
        self.msg_ids.insert(id);
    }

    /// Record a DM exchanged with `counterpart`
    pub fn add_dm_message_id(&mut self, id: MessageId, counterpart: &str, received: bool) {
        let index = if received {
            &mut self.dm_msg_ids_recv
        } else {
            &mut self.dm_msg_ids_sent
        };
        index.entry(counterpart.to_string()).or_default().insert(id);
    }

    /// Append to the rolling chat log
    pub fn add_to_chat_log(&mut self, role: Role, content: LogContent) {
        debug!(agent = %self.id, ?role, ?content, "Appending to chat log");
        self.chat_logs.push(role, content);
    }

    /// Append a free-text system notification
    pub fn notify(&mut self, text: impl Into<String>) {
        self.add_to_chat_log(Role::System, LogContent::Text(text.into()));
    }

    /// Whether the agent should take a turn.
    ///
    /// `false` when the newest log entry is the agent's own last message,
    /// meaning nothing arrived since it spoke.
    pub fn can_reply(&self, last_sent: Option<MessageId>) -> bool {
        match (last_sent, self.chat_logs.last()) {
            (None, _) | (_, None) => true,
            (Some(id), Some(entry)) => entry.content != LogContent::Message(id),
        }
    }

    /// Rolling chat log
    pub fn chat_logs(&self) -> &ChatLog {
        &self.chat_logs
    }

    /// Change the chat log bound, truncating if needed
    pub fn set_max_lookback(&mut self, max_lookback: usize) {
        self.chat_logs.set_capacity(max_lookback);
    }

    /// Ids of sent messages, oldest first
    pub fn message_ids(&self) -> impl DoubleEndedIterator<Item = MessageId> + '_ {
        self.msg_ids.iter().copied()
    }

    /// Ids of DMs received from (`received`) or sent to `counterpart`, oldest first
    pub fn dm_message_ids(&self, counterpart: &str, received: bool) -> Vec<MessageId> {
        let index = if received {
            &self.dm_msg_ids_recv
        } else {
            &self.dm_msg_ids_sent
        };
        index
            .get(counterpart)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Clear message ids, DM indices and the chat log
    pub fn reset(&mut self) {
        self.msg_ids.clear();
        self.dm_msg_ids_recv.clear();
        self.dm_msg_ids_sent.clear();
        self.chat_logs.clear();
    }
}
