//! Builder for messages entering the chatroom.

use crate::chat::{ChatMessage, MessageId};
use crate::llm::LlmResponse;

/// A message about to be sent, before it has an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Message text
    pub text: String,
    /// Agent the message appears to come from
    pub sent_by: String,
    /// Issued by the human
    pub sent_by_you: bool,
    /// DM recipient
    pub sent_to: Option<String>,
    /// Rationale
    pub thought_process: Option<String>,
    /// Message replied to
    pub reply_to: Option<MessageId>,
    /// Suspect
    pub suspect: Option<String>,
    /// Suspicion level
    pub suspect_confidence: Option<u32>,
    /// Suspicion reason
    pub suspect_reason: Option<String>,
}

impl OutgoingMessage {
    /// A public message from `sent_by`
    pub fn new(sent_by: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sent_by: sent_by.into(),
            sent_by_you: false,
            sent_to: None,
            thought_process: None,
            reply_to: None,
            suspect: None,
            suspect_confidence: None,
            suspect_reason: None,
        }
    }

    /// The message an LLM agent sends for a validated reply
    pub fn from_response(agent_id: &str, response: &LlmResponse) -> Self {
        Self {
            text: response.message.clone(),
            sent_by: agent_id.to_string(),
            sent_by_you: false,
            sent_to: response.send_to.clone(),
            thought_process: Some(response.intent.clone()),
            reply_to: None,
            suspect: response.suspect.clone(),
            suspect_confidence: response.suspect_confidence,
            suspect_reason: response.suspect_reason.clone(),
        }
    }

    /// Mark as issued by the human
    pub fn by_human(mut self) -> Self {
        self.sent_by_you = true;
        self
    }

    /// Send as a DM
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.sent_to = Some(recipient.into());
        self
    }

    /// Reply to an earlier message
    pub fn replying_to(mut self, id: MessageId) -> Self {
        self.reply_to = Some(id);
        self
    }

    /// Attach the sender's rationale
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.thought_process = Some(intent.into());
        self
    }

    /// Attach a suspicion snapshot
    pub fn with_suspicion(
        mut self,
        suspect: impl Into<String>,
        confidence: u32,
        reason: impl Into<String>,
    ) -> Self {
        self.suspect = Some(suspect.into());
        self.suspect_confidence = Some(confidence);
        self.suspect_reason = Some(reason.into());
        self
    }

    /// Materialize with an allocated id
    pub fn into_message(self, id: MessageId) -> ChatMessage {
        let mut msg = ChatMessage::new(id, self.text, self.sent_by);
        msg.sent_by_you = self.sent_by_you;
        msg.sent_to = self.sent_to;
        msg.thought_process = self.thought_process;
        msg.reply_to_id = self.reply_to;
        msg.suspect = self.suspect;
        msg.suspect_confidence = self.suspect_confidence;
        msg.suspect_reason = self.suspect_reason;
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let msg = OutgoingMessage::new("alice", "psst")
            .by_human()
            .to("bob")
            .with_suspicion("carol", 90, "too fast")
            .into_message(MessageId::new(7));

        assert_eq!(msg.id, MessageId::new(7));
        assert!(msg.sent_by_you);
        assert_eq!(msg.sent_to.as_deref(), Some("bob"));
        assert_eq!(msg.suspect_confidence, Some(90));
    }

    #[test]
    fn test_from_response() {
        let response = LlmResponse {
            message: "hi".to_string(),
            intent: "greet".to_string(),
            send_to: Some("bob".to_string()),
            ..Default::default()
        };
        let out = OutgoingMessage::from_response("alice", &response);
        assert_eq!(out.sent_by, "alice");
        assert_eq!(out.thought_process.as_deref(), Some("greet"));
        assert!(!out.sent_by_you);
    }
}
