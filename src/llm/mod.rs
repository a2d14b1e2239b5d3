//! LLM side of the chatroom.
//!
//! - [`client`]: the completion transport ([`LlmClient`]), an OpenAI-compatible
//!   HTTP client and a scripted client for tests
//! - [`prompt`]: the system prompts sent on every turn
//! - [`parser`]: the line-oriented reply format
//! - [`responder`]: retries a completion until it parses and validates
//! - [`chat_loop`]: one task per agent deciding when to speak
//!
//! ## Reply format
//!
//! Models answer with one `KEY: value` line per field, see [`parser::SCHEMA_KEYS`].
//! A reply is only acted on once it parses and every agent id it names is
//! on the [`AllowedIds`] list.

pub mod chat_loop;
pub mod client;
pub mod parser;
pub mod prompt;
pub mod responder;
pub mod response;

pub use chat_loop::{ChatLoop, LoopSettings};
pub use client::{ChatTurn, LlmClient, OpenAiClient, ScriptedClient};
pub use prompt::{PromptBuilder, VoteStatus};
pub use responder::{parse_and_validate, Responder};
pub use response::{AllowedIds, LlmResponse, ResponseError};
