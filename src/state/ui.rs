//! UI callback boundary.
//!
//! The engine never renders anything. It reports changes through
//! [`UiCallbacks`], whose methods all default to no-ops so a frontend only
//! implements what it draws. Callbacks run after the state lock is released
//! and must not block.

use tokio::sync::mpsc;

use crate::chat::MessageId;

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational
    Information,
    /// Needs attention
    Warning,
    /// Something failed
    Error,
}

/// Notifications from the engine to the UI
pub trait UiCallbacks: Send + Sync {
    /// A message was added to the history
    fn on_new_message(&self, _id: MessageId) {}

    /// An agent started or stopped composing a reply
    fn on_is_typing(&self, _agent_id: &str, _typing: bool) {}

    /// A system event (vote, termination) was announced
    fn on_event_announced(&self, _text: &str) {}

    /// The remaining agent set changed
    fn on_agents_list_changed(&self) {}

    /// Transient notification
    fn on_toast(&self, _title: &str, _message: &str, _severity: Severity) {}

    /// Every agent task and the background worker have been stopped
    fn on_all_tasks_terminated(&self) {}

    /// The game is over; `conclusion` is the closing text to show
    fn on_game_ended(&self, _won: bool, _conclusion: &str) {}

    /// The chatroom was closed
    fn on_chatroom_closed(&self) {}
}

/// UI that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUi;

impl UiCallbacks for NoopUi {}

/// A UI notification as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// See [`UiCallbacks::on_new_message`]
    NewMessage(MessageId),
    /// See [`UiCallbacks::on_is_typing`]
    Typing {
        /// Agent id
        agent_id: String,
        /// Typing or not
        typing: bool,
    },
    /// See [`UiCallbacks::on_event_announced`]
    EventAnnounced(String),
    /// See [`UiCallbacks::on_agents_list_changed`]
    AgentsListChanged,
    /// See [`UiCallbacks::on_toast`]
    Toast {
        /// Title
        title: String,
        /// Body
        message: String,
        /// Severity
        severity: Severity,
    },
    /// See [`UiCallbacks::on_all_tasks_terminated`]
    AllTasksTerminated,
    /// See [`UiCallbacks::on_game_ended`]
    GameEnded {
        /// Whether the human won
        won: bool,
        /// Closing text
        conclusion: String,
    },
    /// See [`UiCallbacks::on_chatroom_closed`]
    ChatroomClosed,
}

/// UI that forwards every notification over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelUi {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelUi {
    /// Create the UI and the receiving end
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: UiEvent) {
        // Receiver gone means nobody is watching
        let _ = self.tx.send(event);
    }
}

impl UiCallbacks for ChannelUi {
    fn on_new_message(&self, id: MessageId) {
        self.emit(UiEvent::NewMessage(id));
    }

    fn on_is_typing(&self, agent_id: &str, typing: bool) {
        self.emit(UiEvent::Typing {
            agent_id: agent_id.to_string(),
            typing,
        });
    }

    fn on_event_announced(&self, text: &str) {
        self.emit(UiEvent::EventAnnounced(text.to_string()));
    }

    fn on_agents_list_changed(&self) {
        self.emit(UiEvent::AgentsListChanged);
    }

    fn on_toast(&self, title: &str, message: &str, severity: Severity) {
        self.emit(UiEvent::Toast {
            title: title.to_string(),
            message: message.to_string(),
            severity,
        });
    }

    fn on_all_tasks_terminated(&self) {
        self.emit(UiEvent::AllTasksTerminated);
    }

    fn on_game_ended(&self, won: bool, conclusion: &str) {
        self.emit(UiEvent::GameEnded {
            won,
            conclusion: conclusion.to_string(),
        });
    }

    fn on_chatroom_closed(&self) {
        self.emit(UiEvent::ChatroomClosed);
    }
}
