//! Per-agent turn-taking tasks.
//!
//! Each LLM agent runs one tokio task:
//!
//! ```text
//!  idle ──(jitter, can reply)──► requesting ──(valid reply)──► applying ──► idle
//!    │                               │
//!    └──────────(token cancelled)────┴──────────► stopped
//! ```
//!
//! Cancellation is observed while sleeping and while waiting on the LLM.
//! Applying a reply (send, start vote, vote) always runs to completion so
//! manager operations are never torn.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::responder::Responder;
use super::response::{AllowedIds, LlmResponse};
use crate::chat::MessageId;
use crate::config::GameConfig;
use crate::error::Result;
use crate::state::{GameStateManager, OutgoingMessage};

/// How often a paused agent re-checks the pause flag
const PAUSE_POLL: Duration = Duration::from_millis(500);

/// Pacing knobs for the agent tasks
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Per-turn delay range in seconds
    pub turn_delay_secs: RangeInclusive<u64>,
    /// Turns an agent may skip while nothing new arrived
    pub max_turn_skips: u32,
}

impl From<&GameConfig> for LoopSettings {
    fn from(config: &GameConfig) -> Self {
        Self {
            turn_delay_secs: config.turn_delay_range(),
            max_turn_skips: config.max_turn_skips,
        }
    }
}

struct AgentTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// The set of running agent tasks
pub struct ChatLoop {
    your_agent_id: String,
    root: CancellationToken,
    tasks: HashMap<String, AgentTask>,
    paused: Arc<AtomicBool>,
    allowed: AllowedIds,
}

impl std::fmt::Debug for ChatLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatLoop")
            .field("your_agent_id", &self.your_agent_id)
            .field("agents", &self.active_agents())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

impl ChatLoop {
    /// Spawn one task per agent in `agent_ids`.
    ///
    /// Task tokens are children of `parent`. Must be called within a tokio
    /// runtime.
    pub fn start(
        manager: &Arc<GameStateManager>,
        agent_ids: Vec<String>,
        your_agent_id: impl Into<String>,
        parent: &CancellationToken,
    ) -> Self {
        let responder = Responder::new(
            manager.llm_client(),
            manager.allowed_ids(),
            &manager.config().game,
        );
        let settings = LoopSettings::from(&manager.config().game);
        let root = parent.child_token();
        let paused = Arc::new(AtomicBool::new(false));

        let mut tasks = HashMap::new();
        for agent_id in agent_ids {
            tracing::info!("Starting agent loop for {}", agent_id);
            let token = root.child_token();
            let handle = tokio::spawn(agent_loop(
                Arc::downgrade(manager),
                responder.clone(),
                agent_id.clone(),
                settings.clone(),
                paused.clone(),
                token.clone(),
            ));
            tasks.insert(agent_id, AgentTask { token, handle });
        }

        let chat_loop = Self {
            your_agent_id: your_agent_id.into(),
            root,
            tasks,
            paused,
            allowed: manager.allowed_ids(),
        };
        chat_loop.refresh_allowed_ids();
        chat_loop
    }

    /// Stop agents from requesting new turns
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Let agents take turns again
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Whether the loop is paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Agents with a live task, sorted
    pub fn active_agents(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether `agent_id`'s task is still running
    pub fn is_running(&self, agent_id: &str) -> bool {
        self.tasks
            .get(agent_id)
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stop every agent
    pub fn stop(&mut self) {
        let ids = self.active_agents();
        self.stop_agents(&ids);
        self.root.cancel();
    }

    /// Stop specific agents and shrink the allow-list
    pub fn stop_agents(&mut self, agent_ids: &[String]) {
        for agent_id in agent_ids {
            match self.tasks.remove(agent_id) {
                Some(task) => {
                    tracing::info!("Stopping agent loop for {}", agent_id);
                    task.token.cancel();
                }
                None => tracing::warn!("No running loop for agent {}", agent_id),
            }
        }
        self.refresh_allowed_ids();
    }

    fn refresh_allowed_ids(&self) {
        self.allowed.set(
            self.tasks
                .keys()
                .map(String::as_str)
                .chain(std::iter::once(self.your_agent_id.as_str())),
        );
    }
}

/// Clears the typing indicator when a turn ends, however it ends
struct TypingGuard<'a> {
    manager: &'a GameStateManager,
    agent_id: &'a str,
}

impl<'a> TypingGuard<'a> {
    fn new(manager: &'a GameStateManager, agent_id: &'a str) -> Self {
        manager.set_typing(agent_id, true);
        Self { manager, agent_id }
    }
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.manager.set_typing(self.agent_id, false);
    }
}

async fn agent_loop(
    manager: Weak<GameStateManager>,
    responder: Responder,
    agent_id: String,
    settings: LoopSettings,
    paused: Arc<AtomicBool>,
    token: CancellationToken,
) {
    let mut first_turn = true;
    let mut last_sent: Option<MessageId> = None;
    let mut turns_skipped = 0;

    loop {
        if !first_turn {
            let delay = rand::thread_rng().gen_range(settings.turn_delay_secs.clone());
            tokio::select! {
                () = token.cancelled() => break,
                () = sleep(Duration::from_secs(delay)) => {}
            }
        }

        if paused.load(Ordering::SeqCst) {
            tokio::select! {
                () = token.cancelled() => break,
                () = sleep(PAUSE_POLL) => {}
            }
            continue;
        }

        let Some(manager) = manager.upgrade() else {
            break;
        };

        match manager.agent_can_reply(&agent_id, last_sent).await {
            Ok(true) => {}
            Ok(false) if turns_skipped < settings.max_turn_skips => {
                turns_skipped += 1;
                tracing::debug!("{} has nothing new to reply to ({} skipped)", agent_id, turns_skipped);
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Agent {} can no longer take turns: {}", agent_id, e);
                break;
            }
        }
        turns_skipped = 0;
        first_turn = false;

        let messages = match manager.turn_messages(&agent_id).await {
            Ok(Some(messages)) => messages,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Could not build prompt for {}: {}", agent_id, e);
                continue;
            }
        };

        tracing::info!("Requesting response from agent ({}) ...", agent_id);
        let typing = TypingGuard::new(&manager, &agent_id);
        let generated = tokio::select! {
            () = token.cancelled() => break,
            result = responder.generate(&agent_id, messages) => result,
        };

        let response = match generated {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("LLM request for {} failed: {}", agent_id, e);
                continue;
            }
        };

        match apply_response(&manager, &agent_id, &response, typing).await {
            Ok(id) => last_sent = Some(id),
            Err(e) if e.is_transport() => tracing::error!("Turn of {} failed: {}", agent_id, e),
            Err(e) => tracing::warn!("Turn of {} rejected: {}", agent_id, e),
        }
    }

    tracing::info!("Agent ({}) has been stopped", agent_id);
}

async fn apply_response(
    manager: &GameStateManager,
    agent_id: &str,
    response: &LlmResponse,
    typing: TypingGuard<'_>,
) -> Result<MessageId> {
    let id = manager
        .send_message(OutgoingMessage::from_response(agent_id, response))
        .await?;
    drop(typing);

    // A vote may have opened while the reply was generated
    let mut vote_open = manager.voting_status().await.is_some();
    if response.start_a_vote && !vote_open {
        tracing::info!("{} has requested to start a vote", agent_id);
        manager.start_vote(agent_id, false).await?;
        vote_open = manager.voting_status().await.is_some();
    }

    if vote_open {
        if let Some(target) = &response.voting_for {
            manager.vote(agent_id, target, false).await?;
        }
    }
    Ok(id)
}
