//! Chatroom state and its orchestrator.
//!
//! [`GameState`] is the synchronous aggregate: history, agents, voting and
//! clocks. [`GameStateManager`] owns it behind a mutex and is the only
//! writer; it also owns the agent tasks and the background clock and
//! reports changes through [`UiCallbacks`].
//!
//! ```text
//!  UI ──► GameStateManager ──► GameState
//!              │  ▲
//!   ChatLoop ──┘  └── background tick (vote expiry)
//! ```

mod activity;
mod events;
mod game;
mod manager;
mod outgoing;
pub mod persist;
mod ui;

pub use activity::SpeakerWindow;
pub use events::{GameEvent, GameEventKind, GameEventLog};
pub use game::GameState;
pub use manager::GameStateManager;
pub use outgoing::OutgoingMessage;
pub use ui::{ChannelUi, NoopUi, Severity, UiCallbacks, UiEvent};
