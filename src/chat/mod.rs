//! Chat messages, the message history and text formatting.
//!
//! Messages are identified by a monotonic [`MessageId`] and are immutable
//! except through [`ChatMessage::edit`] and [`ChatMessage::delete`]. Every
//! change appends an [`EditRecord`] holding the previous content, and a
//! deleted message accepts no further changes.
//!
//! # Example
//!
//! ```
//! use allms::chat::{ChatMessage, MessageHistory, MessageIdGenerator};
//!
//! let mut ids = MessageIdGenerator::new();
//! let mut history = MessageHistory::new();
//!
//! let id = ids.next_id();
//! history.add(ChatMessage::new(id, "anyone else find bob odd?", "alice")).unwrap();
//! assert!(history.edit(id, "anyone else find carol odd?", true).unwrap());
//! assert!(history.delete(id, true).unwrap());
//! assert!(!history.edit(id, "too late", true).unwrap());
//! ```

pub mod formatter;
mod history;
mod message;

pub use history::MessageHistory;
pub use message::{ChatMessage, EditRecord, MessageId, MessageIdGenerator};

/// Sender name used for system announcements
pub const SYSTEM_SENDER: &str = "system";

/// Current UNIX time in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
