//! # Among LLMs - chatroom engine
//!
//! A social-deduction chatroom: a group of LLM-driven agents, each with a
//! persona, talk about a scenario while one of them is secretly controlled by
//! a human. The agents try to find and vote out the human; the human wins
//! by surviving until only one other agent remains.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   UI ─────────► │       GameStateManager       │ ──► UiCallbacks
//!  (send, edit,   │  Mutex<GameState>            │
//!   vote, pause)  │  ChatLoop (1 task per agent) │
//!                 │  background tick             │
//!                 └──────┬────────────────▲──────┘
//!                        │ turn prompt    │ validated reply
//!                        ▼                │
//!                   Responder ──► LlmClient (HTTP / scripted)
//! ```
//!
//! Every mutation goes through [`GameStateManager`]. Agent tasks, the
//! background clock and the UI all call into it; a single async mutex
//! serializes them, so message ids are strictly increasing and each message
//! is delivered exactly once to every recipient.
//!
//! ## Game flow
//!
//! ```text
//!   [Playing] ──start_vote──► [Voting] ──majority / timer──► resolve
//!       ▲                                                      │
//!       └───────────── no quorum / tie / agent removed ◄───────┤
//!                                                              │
//!   [Ended: lost] ◄── human voted out      ≤ 2 agents left ──► [Ended: won]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use allms::{Config, GameState, GameStateManager, NoopUi, OutgoingMessage, ScriptedClient};
//!
//! # async fn run() -> allms::Result<()> {
//! let config = Config::default();
//! let agents = vec![
//!     ("alice".to_string(), "a nervous intern".to_string()),
//!     ("bob".to_string(), "a grizzled detective".to_string()),
//!     ("carol".to_string(), "a cheerful baker".to_string()),
//! ];
//! let state = GameState::new(&config.game, "mystery", "a locked train", agents, "bob")?;
//!
//! let llm = Arc::new(ScriptedClient::repeating(
//!     "MESSAGE: hello\nINTENT: blend in\nSTART_A_VOTE: False",
//! ));
//! let manager = GameStateManager::new(config, state, llm, Arc::new(NoopUi))?;
//! manager.start_llms().await?;
//! manager
//!     .send_message(OutgoingMessage::new("bob", "evening all").by_human())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod state;
pub mod vote;

// Re-exports for convenience
pub use agent::{Agent, ChatLog, LogContent, Role};
pub use chat::{ChatMessage, MessageHistory, MessageId};
pub use config::{Config, GameConfig, LlmConfig, StorageConfig};
pub use error::{GameError, Result};
pub use llm::{
    AllowedIds, ChatLoop, ChatTurn, LlmClient, LlmResponse, OpenAiClient, PromptBuilder,
    Responder, ResponseError, ScriptedClient,
};
pub use state::{
    ChannelUi, GameEvent, GameEventKind, GameState, GameStateManager, NoopUi, OutgoingMessage,
    Severity, UiCallbacks, UiEvent,
};
pub use vote::{AgentVoting, VoteOutcome, VoteResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
