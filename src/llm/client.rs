//! LLM completion clients.
//!
//! [`LlmClient`] is the only boundary the engine needs: a list of chat turns
//! in, raw completion text out. [`OpenAiClient`] speaks the OpenAI-compatible
//! `/chat/completions` API (Ollama, OpenRouter, vLLM, ...).
//! [`ScriptedClient`] replays canned replies for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Role;
use crate::config::LlmConfig;
use crate::error::{GameError, Result};

/// One message of a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Conversation role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatTurn {
    /// Create a turn
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Source of completions
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a conversation, returning the raw reply text
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String>;

    /// Model name, for logs
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Build a client from configuration
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GameError::Network(format!("Failed to create HTTP client: {e}")))?;
        let api_key = config.api_key();
        Ok(Self {
            http,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            reasoning_effort: self.config.reasoning_effort.as_deref(),
        };

        let mut builder = self.http.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(GameError::Llm("Rate limited".to_string()));
            }
            return Err(GameError::Llm(format!("API error {status}: {error_text}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GameError::Llm(format!("JSON parse error: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(model = %self.config.model, chars = content.len(), "Completion received");
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

type ScriptFn = Box<dyn Fn(&[ChatTurn]) -> Result<String> + Send + Sync>;

enum Script {
    Queue {
        replies: Mutex<VecDeque<String>>,
        fallback: Option<String>,
    },
    Func(ScriptFn),
}

/// Client that replays scripted replies
pub struct ScriptedClient {
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedClient {
    /// Reply with `replies` in order, then fail
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Queue {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
        })
    }

    /// Reply with `reply` on every call
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::with_script(Script::Queue {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
        })
    }

    /// Compute each reply from the request
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[ChatTurn]) -> Result<String> + Send + Sync + 'static,
    {
        Self::with_script(Script::Func(Box::new(f)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply to use once the queue runs dry
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        if let Script::Queue { fallback, .. } = &mut self.script {
            *fallback = Some(reply.into());
        }
        self
    }

    /// Number of completions requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for ScriptedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedClient")
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());

        match &self.script {
            Script::Queue { replies, fallback } => {
                let next = replies
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                next.or_else(|| fallback.clone())
                    .ok_or_else(|| GameError::Llm("Script exhausted".to_string()))
            }
            Script::Func(f) => f(messages),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_queue_then_fallback() {
        let client = ScriptedClient::new(["one", "two"]).with_fallback("again");
        let turns = [ChatTurn::system("hi")];
        assert_eq!(client.complete(&turns).await.unwrap(), "one");
        assert_eq!(client.complete(&turns).await.unwrap(), "two");
        assert_eq!(client.complete(&turns).await.unwrap(), "again");
        assert_eq!(client.calls(), 3);
        assert_eq!(client.requests().len(), 3);
    }

    #[test]
    fn test_scripted_exhausted() {
        let client = ScriptedClient::new(["only"]);
        tokio_test::assert_ok!(tokio_test::block_on(client.complete(&[])));
        let err = tokio_test::assert_err!(tokio_test::block_on(client.complete(&[])));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_scripted_fn_sees_request() {
        let client = ScriptedClient::from_fn(|turns| Ok(format!("{} turns", turns.len())));
        let turns = [ChatTurn::system("a"), ChatTurn::new(Role::User, "b")];
        assert_eq!(client.complete(&turns).await.unwrap(), "2 turns");
    }

    #[test]
    fn test_request_serialization() {
        let turns = [ChatTurn::system("rules")];
        let request = ChatRequest {
            model: "gpt-oss:20b",
            messages: &turns,
            temperature: None,
            reasoning_effort: Some("low"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["reasoning_effort"], "low");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_openai_client_builds() {
        let client = OpenAiClient::new(LlmConfig::default()).unwrap();
        assert_eq!(client.model(), "gpt-oss:20b");
    }
}
