//! Chatroom engine error types.
//!
//! # Error Classification
//!
//! Errors fall into three families:
//!
//! - **Protocol**: the LLM produced a reply that does not match the output
//!   schema or names an agent outside the allow-list. These are recovered by the
//!   responder's retry loop and never reach the game state.
//! - **Invariant**: an operation referenced an unknown agent or message, or a
//!   terminated agent tried to act. The manager is the only writer, so these
//!   point at a wiring bug in the caller and abort the offending operation.
//! - **Transport**: the LLM provider could not be reached. Only the affected
//!   agent's turn is lost.
//!
//! The `Response` variant preserves the parser error via `#[source]` so
//! callers using `anyhow` see the full chain.

use thiserror::Error;

use crate::llm::ResponseError;

/// Chatroom engine errors.
#[derive(Error, Debug)]
pub enum GameError {
    /// LLM reply did not match the output schema.
    #[error("Malformed LLM response: {0}")]
    Response(#[source] ResponseError),

    /// Agent id is not tracked by the chatroom.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Message id does not exist in the history.
    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    /// Agent has been voted out and can no longer act.
    #[error("Agent {0} has been terminated")]
    AgentTerminated(String),

    /// Internal invariant violated (caller bug).
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// LLM provider returned an error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Network communication error.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GameError {
    /// Whether this error came from the LLM provider rather than the game.
    pub fn is_transport(&self) -> bool {
        matches!(self, GameError::Llm(_) | GameError::Network(_))
    }
}

/// Result type alias for chatroom operations
pub type Result<T> = std::result::Result<T, GameError>;

impl From<ResponseError> for GameError {
    fn from(err: ResponseError) -> Self {
        GameError::Response(err)
    }
}

impl From<reqwest::Error> for GameError {
    fn from(err: reqwest::Error) -> Self {
        GameError::Network(err.to_string())
    }
}

impl From<toml::de::Error> for GameError {
    fn from(err: toml::de::Error) -> Self {
        GameError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(GameError::Llm("500".to_string()).is_transport());
        assert!(GameError::Network("refused".to_string()).is_transport());
        assert!(!GameError::UnknownAgent("x".to_string()).is_transport());
    }

    #[test]
    fn test_response_error_keeps_source() {
        let err: GameError = ResponseError::MissingField("MESSAGE").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("MESSAGE"));
    }
}
