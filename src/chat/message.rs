//! Chat message records and their edit/delete audit trail.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::now_ms;

/// Monotonic message identifier.
///
/// Serialized as a zero-padded decimal string so lexical and numeric order agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw sequence number
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Raw sequence number
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MessageId {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Hands out strictly increasing message ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageIdGenerator {
    next: u64,
}

impl MessageIdGenerator {
    /// Create a generator starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id
    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

/// One entry of a message's audit trail. Holds the content *before* the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    /// When the change happened (UNIX ms)
    pub timestamp: i64,
    /// Content before the change
    pub prev_msg: String,
    /// Change was an edit made by the human
    pub edited_by_you: bool,
    /// Change was a delete made by the human
    pub deleted_by_you: bool,
}

/// A message in the chatroom.
///
/// Fields are public for reading; [`MessageHistory`](super::MessageHistory)
/// only hands out shared references, so mutation goes through
/// [`edit`](Self::edit) and [`delete`](Self::delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id
    pub id: MessageId,
    /// Send time (UNIX ms)
    pub timestamp: i64,
    /// Current text
    pub msg: String,
    /// Agent the message appears to come from
    pub sent_by: String,
    /// Issued by the human, possibly through another agent
    pub sent_by_you: bool,
    /// DM recipient; `None` for public messages
    pub sent_to: Option<String>,
    /// Rationale reported by the LLM
    pub thought_process: Option<String>,
    /// Message this one replies to
    pub reply_to_id: Option<MessageId>,
    /// Suspect at send time
    pub suspect: Option<String>,
    /// Suspicion confidence (0-100)
    pub suspect_confidence: Option<u32>,
    /// Why the sender suspects them
    pub suspect_reason: Option<String>,
    /// Message has been edited
    pub edited: bool,
    /// Last edit came from the human
    pub edited_by_you: bool,
    /// Message has been deleted
    pub deleted: bool,
    /// Delete came from the human
    pub deleted_by_you: bool,
    /// System/vote/event message rather than agent chat
    pub is_announcement: bool,
    /// Audit trail, oldest first
    pub history_log: Vec<EditRecord>,
}

impl ChatMessage {
    /// Create a public message from `sent_by`
    pub fn new(id: MessageId, msg: impl Into<String>, sent_by: impl Into<String>) -> Self {
        Self {
            id,
            timestamp: now_ms(),
            msg: msg.into(),
            sent_by: sent_by.into(),
            sent_by_you: false,
            sent_to: None,
            thought_process: None,
            reply_to_id: None,
            suspect: None,
            suspect_confidence: None,
            suspect_reason: None,
            edited: false,
            edited_by_you: false,
            deleted: false,
            deleted_by_you: false,
            is_announcement: false,
            history_log: Vec::new(),
        }
    }

    /// Create a system announcement
    pub fn announcement(id: MessageId, msg: impl Into<String>) -> Self {
        let mut message = Self::new(id, msg, super::SYSTEM_SENDER);
        message.is_announcement = true;
        message
    }

    /// Whether this is a direct message
    pub fn is_dm(&self) -> bool {
        self.sent_to.is_some()
    }

    /// Edits and deletes are allowed until the message is deleted
    pub fn can_edit_or_delete(&self) -> bool {
        !self.deleted
    }

    /// Replace the text. Returns `false` (and changes nothing) once deleted.
    pub fn edit(&mut self, new_msg: impl Into<String>, edited_by_you: bool) -> bool {
        if !self.can_edit_or_delete() {
            return false;
        }
        let prev = std::mem::replace(&mut self.msg, new_msg.into());
        self.history_log.push(EditRecord {
            timestamp: now_ms(),
            prev_msg: prev,
            edited_by_you,
            deleted_by_you: false,
        });
        self.edited = true;
        self.edited_by_you = edited_by_you;
        true
    }

    /// Delete the message. Returns `false` (and changes nothing) if already deleted.
    pub fn delete(&mut self, deleted_by_you: bool) -> bool {
        if !self.can_edit_or_delete() {
            return false;
        }
        let prev = std::mem::take(&mut self.msg);
        self.history_log.push(EditRecord {
            timestamp: now_ms(),
            prev_msg: prev,
            edited_by_you: false,
            deleted_by_you,
        });
        self.deleted = true;
        self.deleted_by_you = deleted_by_you;
        true
    }

    /// Content prior to the most recent change
    pub fn previous_content(&self) -> Option<&str> {
        self.history_log.last().map(|r| r.prev_msg.as_str())
    }
}
