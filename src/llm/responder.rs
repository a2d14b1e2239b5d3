//! Bounded request/parse/validate retry loop for one agent turn.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::client::{ChatTurn, LlmClient};
use super::parser;
use super::response::{AllowedIds, LlmResponse, ResponseError};
use crate::config::GameConfig;
use crate::error::Result;

/// Turns a message list into a validated [`LlmResponse`]
#[derive(Clone)]
pub struct Responder {
    client: Arc<dyn LlmClient>,
    allowed: AllowedIds,
    max_retries: u32,
    backoff: Duration,
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("model", &self.client.model())
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Responder {
    /// Create a responder using the retry settings from `config`
    pub fn new(client: Arc<dyn LlmClient>, allowed: AllowedIds, config: &GameConfig) -> Self {
        Self {
            client,
            allowed,
            max_retries: config.max_model_retries.max(1),
            backoff: config.retry_backoff(),
        }
    }

    /// Request a reply for `agent_id`.
    ///
    /// Malformed or invalid replies are fed back as a corrective system note
    /// and retried. `Ok(None)` once the retries are exhausted; `Err` only
    /// for transport failures.
    pub async fn generate(
        &self,
        agent_id: &str,
        mut messages: Vec<ChatTurn>,
    ) -> Result<Option<LlmResponse>> {
        for attempt in 1..=self.max_retries {
            let raw = self.client.complete(&messages).await?;

            match parse_and_validate(&raw, &self.allowed) {
                Ok(response) => {
                    info!(agent = %agent_id, attempt, "Valid response received");
                    return Ok(Some(response));
                }
                Err(err) => {
                    warn!(
                        agent = %agent_id,
                        attempt,
                        error = %err,
                        "Malformed response, retrying"
                    );
                    messages.push(ChatTurn::system(corrective_note(&raw, &err)));
                    if attempt < self.max_retries && !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        warn!(
            agent = %agent_id,
            max_retries = self.max_retries,
            "Exceeded max retries without a usable response"
        );
        Ok(None)
    }
}

/// Parse raw completion text and validate it against the allow-list
pub fn parse_and_validate(raw: &str, allowed: &AllowedIds) -> std::result::Result<LlmResponse, ResponseError> {
    parser::parse(raw)?.validate(allowed)
}

fn corrective_note(raw: &str, err: &ResponseError) -> String {
    format!(
        "Your previous reply could not be used.\nReply: {raw}\nError: {err}\n\
         ENSURE YOU ADHERE TO THE EXPECTED OUTPUT SCHEMA."
    )
}
