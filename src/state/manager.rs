//! The orchestrator and single writer of [`GameState`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::game::GameState;
use super::outgoing::OutgoingMessage;
use super::persist;
use super::ui::{Severity, UiCallbacks};
use crate::chat::{formatter, now_ms, ChatMessage, MessageId};
use crate::config::Config;
use crate::error::{GameError, Result};
use crate::llm::{AllowedIds, ChatLoop, ChatTurn, LlmClient, PromptBuilder, VoteStatus};
use crate::vote::VoteResult;

/// Background tasks of a running game
#[derive(Default)]
struct Tasks {
    chat_loop: Option<ChatLoop>,
    token: Option<CancellationToken>,
    background: Option<JoinHandle<()>>,
}

/// What a termination leads to
enum Aftermath {
    Lost,
    Won,
    Continue(Vec<String>),
}

/// Orchestrates one chatroom.
///
/// Owns the [`GameState`] behind an async mutex, the agent tasks and the
/// background clock. Every mutation goes through this type; message-id
/// allocation and application share one critical section, and UI callbacks
/// run after the lock is released.
pub struct GameStateManager {
    config: Config,
    state: Mutex<GameState>,
    ui: Arc<dyn UiCallbacks>,
    llm: Arc<dyn LlmClient>,
    allowed: AllowedIds,
    tasks: StdMutex<Tasks>,
}

impl std::fmt::Debug for GameStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStateManager")
            .field("model", &self.llm.model())
            .field("allowed", &self.allowed.snapshot())
            .finish_non_exhaustive()
    }
}

impl GameStateManager {
    /// Wrap a game. Configuration bounds are applied to `state`.
    pub fn new(
        config: Config,
        mut state: GameState,
        llm: Arc<dyn LlmClient>,
        ui: Arc<dyn UiCallbacks>,
    ) -> Result<Arc<Self>> {
        config.game.validate()?;
        state.apply_config(&config.game);
        let allowed = AllowedIds::new(state.remaining_agent_ids());

        Ok(Arc::new(Self {
            config,
            state: Mutex::new(state),
            ui,
            llm,
            allowed,
            tasks: StdMutex::new(Tasks::default()),
        }))
    }

    /// Load a saved chatroom
    pub fn load(
        config: Config,
        path: &Path,
        llm: Arc<dyn LlmClient>,
        ui: Arc<dyn UiCallbacks>,
    ) -> Result<Arc<Self>> {
        let state = persist::load(path, &config.game)?;
        Self::new(config, state, llm, ui)
    }

    // =========================================================================
    // Task lifecycle
    // =========================================================================

    /// Spawn the agent tasks and the background clock.
    ///
    /// Any previously running tasks are stopped first.
    pub async fn start_llms(self: &Arc<Self>) -> Result<()> {
        let (agent_ids, your_agent_id, paused) = {
            let state = self.state.lock().await;
            if state.game_ended {
                return Err(GameError::Invariant("the game has already ended".to_string()));
            }
            (
                state.llm_agent_ids(),
                state.your_agent_id().to_string(),
                state.game_paused,
            )
        };

        self.stop_tasks();

        let token = CancellationToken::new();
        let chat_loop = ChatLoop::start(self, agent_ids, your_agent_id, &token);
        if paused {
            chat_loop.pause();
        }
        let background = tokio::spawn(Self::background_worker(
            Arc::downgrade(self),
            token.child_token(),
        ));

        let mut tasks = self.lock_tasks();
        tasks.chat_loop = Some(chat_loop);
        tasks.token = Some(token);
        tasks.background = Some(background);
        tracing::info!("Chatroom started");
        Ok(())
    }

    /// Cancel every task. Returns whether anything was running.
    fn stop_tasks(&self) -> bool {
        let mut tasks = self.lock_tasks();
        let mut running = false;
        if let Some(mut chat_loop) = tasks.chat_loop.take() {
            chat_loop.stop();
            running = true;
        }
        if let Some(token) = tasks.token.take() {
            token.cancel();
            running = true;
        }
        // Not awaited: the caller may be running inside the worker itself
        tasks.background = None;
        running
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ticks once per second until cancelled
    async fn background_worker(manager: Weak<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(manager) = manager.upgrade() else {
                break;
            };
            if let Err(e) = manager.tick_at(now_ms()).await {
                tracing::warn!("Background tick failed: {}", e);
            }
        }
        tracing::debug!("Background worker stopped");
    }

    /// Advance the clocks to `now_ms` and close an expired vote
    pub async fn tick_at(&self, now_ms: i64) -> Result<()> {
        let expired = {
            let mut state = self.state.lock().await;
            state.update_duration(now_ms);
            state.vote_timer_expired()
        };
        if expired {
            tracing::info!("Vote timer expired, closing the vote");
            self.end_vote().await?;
        }
        Ok(())
    }

    /// Pause the agents and the game clock
    pub async fn pause(&self) {
        {
            let mut state = self.state.lock().await;
            state.update_duration(now_ms());
            state.game_paused = true;
        }
        if let Some(chat_loop) = self.lock_tasks().chat_loop.as_ref() {
            chat_loop.pause();
        }
        tracing::info!("Chatroom paused");
    }

    /// Resume the agents and the game clock
    pub async fn resume(&self) {
        {
            let mut state = self.state.lock().await;
            state.update_duration(now_ms());
            state.game_paused = false;
        }
        if let Some(chat_loop) = self.lock_tasks().chat_loop.as_ref() {
            chat_loop.resume();
        }
        tracing::info!("Chatroom resumed");
    }

    /// Stop everything and tell the UI the room is gone
    pub fn close_chatroom(&self) {
        self.stop_tasks();
        tracing::info!("Chatroom closed");
        self.ui.on_all_tasks_terminated();
        self.ui.on_chatroom_closed();
    }

    /// Stop the tasks and restart with the same scenario and agents.
    ///
    /// Call [`start_llms`](Self::start_llms) afterwards to spawn the agents again.
    pub async fn restart(&self) {
        self.stop_tasks();
        {
            let mut state = self.state.lock().await;
            state.reset();
            self.allowed.set(state.remaining_agent_ids());
        }
        self.ui.on_agents_list_changed();
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Allocate an id and apply the message in one critical section
    pub async fn send_message(&self, message: OutgoingMessage) -> Result<MessageId> {
        let id = {
            let mut state = self.state.lock().await;
            if state.game_ended {
                return Err(GameError::Invariant("the game has ended".to_string()));
            }
            let id = state.next_message_id();
            state.add_message(message.into_message(id))?;
            id
        };
        self.ui.on_new_message(id);
        Ok(id)
    }

    /// Edit a message. `Ok(false)` once it was deleted.
    pub async fn edit_message(&self, id: MessageId, text: &str, by_you: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.edit_message(id, text, by_you)
    }

    /// Delete a message. `Ok(false)` if it was already deleted.
    pub async fn delete_message(&self, id: MessageId, by_you: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.delete_message(id, by_you)
    }

    // =========================================================================
    // Voting
    // =========================================================================

    /// Open a vote. `Ok(false)` if one is already open or the starter was terminated.
    pub async fn start_vote(&self, started_by: &str, by_you: bool) -> Result<bool> {
        let text = {
            let mut state = self.state.lock().await;
            if !state.is_tracked(started_by) {
                return Err(GameError::UnknownAgent(started_by.to_string()));
            }
            if !state.is_remaining(started_by) {
                tracing::warn!("Terminated agent {} tried to start a vote", started_by);
                return Ok(false);
            }
            if !state.start_voting(started_by, by_you) {
                tracing::debug!("{} tried to start a vote while one is open", started_by);
                return Ok(false);
            }

            let minutes = state.config().max_vote_duration_min;
            let text = format!(
                "{started_by} has started a vote. Voting closes in {minutes} minute(s) or once a majority is reached."
            );
            state.record_announcement(&text)?;
            state.announce_to_remaining(&text);
            if by_you && started_by != state.your_agent_id() {
                state.notify(started_by, formatter::vote_started_by_human())?;
            }
            text
        };

        tracing::info!("Vote started by {}", started_by);
        self.ui.on_event_announced(&text);
        self.ui.on_toast("Vote started", &text, Severity::Information);
        Ok(true)
    }

    /// Cast a ballot, closing the vote once it can be decided.
    ///
    /// Unknown ids are errors. A terminated voter or target, a closed vote
    /// and a second ballot return `Ok(false)`.
    pub async fn vote(&self, by: &str, target: &str, by_you: bool) -> Result<bool> {
        let (accepted, can_end) = {
            let mut state = self.state.lock().await;
            let accepted = state.vote(by, target)?;
            if accepted && by_you && by != state.your_agent_id() {
                state.notify(by, formatter::voted_by_human(target))?;
            }
            (accepted, accepted && state.can_end_vote())
        };

        if accepted {
            tracing::info!("{} voted for {}", by, target);
        }
        if can_end {
            self.end_vote().await?;
        }
        Ok(accepted)
    }

    /// Close and resolve the open vote; terminates the decided agent
    pub async fn end_vote(&self) -> Result<Option<VoteResult>> {
        let (result, summary) = {
            let mut state = self.state.lock().await;
            let Some(result) = state.end_voting() else {
                return Ok(None);
            };
            let summary = result.summary();
            state.record_announcement(&summary)?;
            state.announce_to_remaining(&summary);
            (result, summary)
        };

        tracing::info!("Vote ended: {}", result.outcome);
        self.ui.on_event_announced(&summary);
        self.ui
            .on_toast("Vote ended", &result.outcome.to_string(), Severity::Information);

        if let Some(target) = result.outcome.terminated() {
            self.terminate_agent(target).await?;
        }
        Ok(Some(result))
    }

    /// Remove an agent and decide whether the game is over
    pub async fn terminate_agent(&self, agent_id: &str) -> Result<()> {
        let (aftermath, text) = {
            let mut state = self.state.lock().await;
            if !state.remove_agent(agent_id)? {
                tracing::warn!("{} was already terminated", agent_id);
                return Ok(());
            }

            let text = formatter::not_the_human(agent_id);
            let aftermath = if agent_id == state.your_agent_id() {
                Aftermath::Lost
            } else if state.remaining_agent_ids().len() <= 2 {
                Aftermath::Won
            } else {
                state.record_announcement(&text)?;
                state.announce_to_remaining(&text);
                Aftermath::Continue(state.remaining_agent_ids().iter().cloned().collect())
            };
            (aftermath, text)
        };

        tracing::info!("Agent {} terminated", agent_id);
        self.ui.on_agents_list_changed();

        match aftermath {
            Aftermath::Lost => {
                self.ui
                    .on_toast("Game over", "You have been voted out", Severity::Warning);
                self.end_game(false).await
            }
            Aftermath::Won => {
                self.ui.on_toast(
                    "You won",
                    "Only one agent is left besides you",
                    Severity::Information,
                );
                self.end_game(true).await
            }
            Aftermath::Continue(remaining) => {
                if let Some(chat_loop) = self.lock_tasks().chat_loop.as_mut() {
                    chat_loop.stop_agents(&[agent_id.to_string()]);
                }
                self.allowed.set(&remaining);
                self.ui.on_event_announced(&text);
                self.ui
                    .on_toast("Agent terminated", &text, Severity::Information);
                Ok(())
            }
        }
    }

    /// End the game, close any open vote and stop every task
    pub async fn end_game(&self, won: bool) -> Result<()> {
        let conclusion = {
            let mut state = self.state.lock().await;
            if state.game_ended {
                return Ok(());
            }
            state.end_game(won);
            formatter::game_conclusion(
                won,
                state.your_agent_id(),
                state.remaining_agent_ids().iter().map(String::as_str),
            )
        };

        self.stop_tasks();
        tracing::info!("Game ended (won: {})", won);
        self.ui.on_game_ended(won, &conclusion);
        self.ui.on_all_tasks_terminated();
        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Save to `path`, or to the default save path of the chatroom
    pub async fn save_chatroom(&self, path: Option<&Path>) -> Result<PathBuf> {
        let state = self.state.lock().await;
        let path = path.map_or_else(
            || persist::default_path(&self.config.storage, state.chatroom_id),
            Path::to_path_buf,
        );
        persist::save(&state, &path)?;
        Ok(path)
    }

    /// Render the history as a transcript
    pub async fn export_transcript(&self) -> String {
        let state = self.state.lock().await;
        formatter::export_transcript(state.messages(), state.your_agent_id())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared allow-list handle
    pub fn allowed_ids(&self) -> AllowedIds {
        self.allowed.clone()
    }

    /// LLM client
    pub fn llm_client(&self) -> Arc<dyn LlmClient> {
        self.llm.clone()
    }

    /// Report an agent's typing state to the UI
    pub fn set_typing(&self, agent_id: &str, typing: bool) {
        self.ui.on_is_typing(agent_id, typing);
    }

    /// Copy of a message
    pub async fn message(&self, id: MessageId) -> Option<ChatMessage> {
        self.state.lock().await.message(id).cloned()
    }

    /// Agent that opened the current vote, if one is open
    pub async fn voting_status(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .voting_status()
            .map(str::to_string)
    }

    /// Ballot target of `by` in the open vote
    pub async fn voted_for(&self, by: &str) -> Option<String> {
        self.state.lock().await.voted_for(by).map(str::to_string)
    }

    /// Whether `by` may still vote
    pub async fn can_vote(&self, by: &str) -> bool {
        self.state.lock().await.can_vote(by)
    }

    /// Agents still in the game
    pub async fn remaining_agent_ids(&self) -> BTreeSet<String> {
        self.state.lock().await.remaining_agent_ids().clone()
    }

    /// Agent the human controls
    pub async fn your_agent_id(&self) -> String {
        self.state.lock().await.your_agent_id().to_string()
    }

    /// Whether the game is over
    pub async fn is_game_ended(&self) -> bool {
        self.state.lock().await.game_ended
    }

    /// An agent's chat log resolved into completion turns
    pub async fn llm_context(&self, agent_id: &str) -> Result<Vec<ChatTurn>> {
        self.state.lock().await.llm_context(agent_id)
    }

    /// Whether anything arrived since `agent_id` last spoke
    pub async fn agent_can_reply(&self, agent_id: &str, last_sent: Option<MessageId>) -> Result<bool> {
        Ok(self.state.lock().await.agent(agent_id)?.can_reply(last_sent))
    }

    /// Full completion request for `agent_id`'s next turn.
    ///
    /// `None` once the agent was terminated or the game ended.
    pub async fn turn_messages(&self, agent_id: &str) -> Result<Option<Vec<ChatTurn>>> {
        let state = self.state.lock().await;
        if state.game_ended || !state.is_remaining(agent_id) {
            return Ok(None);
        }

        let vote = match state.voting_status() {
            Some(started_by) => VoteStatus::Started {
                started_by: started_by.to_string(),
                voted_for: state.voted_for(agent_id).map(str::to_string),
            },
            None => VoteStatus::NotStarted,
        };
        let prompts = PromptBuilder::new(state.scenario.clone(), state.personas());
        let history = state.llm_context(agent_id)?;
        Ok(Some(prompts.turn_messages(
            agent_id,
            &vote,
            &state.terminated_agent_ids(),
            history,
        )))
    }

    /// Run `f` against the state for read-only inspection
    pub async fn with_state<R>(&self, f: impl FnOnce(&GameState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Agents with a running task
    pub fn active_agents(&self) -> Vec<String> {
        self.lock_tasks()
            .chat_loop
            .as_ref()
            .map(ChatLoop::active_agents)
            .unwrap_or_default()
    }
}
