//! The game aggregate: agents, history, voting and clocks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::activity::SpeakerWindow;
use super::events::{GameEventKind, GameEventLog};
use crate::agent::{Agent, LogContent, Role};
use crate::chat::{
    formatter, now_ms, ChatMessage, MessageHistory, MessageId, MessageIdGenerator, SYSTEM_SENDER,
};
use crate::config::GameConfig;
use crate::error::{GameError, Result};
use crate::llm::ChatTurn;
use crate::vote::{AgentVoting, VoteResult};

/// Mutable state of one chatroom.
///
/// Mutated only by [`GameStateManager`](super::GameStateManager), which
/// holds it behind a mutex. Every method here is synchronous so a caller can
/// chain several of them inside one critical section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Unique chatroom id
    pub chatroom_id: Uuid,
    your_agent_id: String,
    /// Scenario genre
    pub genre: String,
    /// Scenario text
    pub scenario: String,
    /// Game start (UNIX ms)
    pub start_time: i64,
    /// Unpaused time played (ms)
    pub elapsed_duration: i64,
    last_update_time: i64,
    vote_duration_timer: i64,
    /// Agents are paused
    pub game_paused: bool,
    /// Game is over
    pub game_ended: bool,
    /// Human won (only meaningful once ended)
    pub game_won: bool,
    messages: MessageHistory,
    id_generator: MessageIdGenerator,
    events: GameEventLog,
    all_agents: BTreeMap<String, Agent>,
    remaining_agent_ids: BTreeSet<String>,
    voting: AgentVoting,
    speakers: SpeakerWindow,
    #[serde(skip)]
    config: GameConfig,
}

impl GameState {
    /// Create a chatroom for `agents` (`(id, persona)` pairs) with the human playing `your_agent_id`
    pub fn new(
        config: &GameConfig,
        genre: impl Into<String>,
        scenario: impl Into<String>,
        agents: Vec<(String, String)>,
        your_agent_id: impl Into<String>,
    ) -> Result<Self> {
        let your_agent_id = your_agent_id.into();
        if agents.len() < config.min_agent_count {
            return Err(GameError::Invariant(format!(
                "at least {} agents are required, got {}",
                config.min_agent_count,
                agents.len()
            )));
        }

        let mut all_agents = BTreeMap::new();
        for (id, persona) in agents {
            if id.eq_ignore_ascii_case(SYSTEM_SENDER) {
                return Err(GameError::Invariant(format!("agent id {id} is reserved")));
            }
            if all_agents.contains_key(&id) {
                return Err(GameError::Invariant(format!("duplicate agent id {id}")));
            }
            let agent = Agent::new(id.clone(), persona, config.max_lookback_messages);
            all_agents.insert(id, agent);
        }
        if !all_agents.contains_key(&your_agent_id) {
            return Err(GameError::UnknownAgent(your_agent_id));
        }

        let now = now_ms();
        let remaining_agent_ids = all_agents.keys().cloned().collect();
        Ok(Self {
            chatroom_id: Uuid::new_v4(),
            your_agent_id,
            genre: genre.into(),
            scenario: scenario.into(),
            start_time: now,
            elapsed_duration: 0,
            last_update_time: now,
            vote_duration_timer: 0,
            game_paused: false,
            game_ended: false,
            game_won: false,
            messages: MessageHistory::new(),
            id_generator: MessageIdGenerator::new(),
            events: GameEventLog::new(),
            all_agents,
            remaining_agent_ids,
            voting: AgentVoting::new(),
            speakers: SpeakerWindow::new(config.silence_window),
            config: config.clone(),
        })
    }

    /// Re-apply configuration bounds, e.g. after loading a save
    pub fn apply_config(&mut self, config: &GameConfig) {
        for agent in self.all_agents.values_mut() {
            agent.set_max_lookback(config.max_lookback_messages);
        }
        self.speakers.set_capacity(config.silence_window);
        self.config = config.clone();
    }

    /// Rules in effect
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // =========================================================================
    // Agents
    // =========================================================================

    /// Agent the human controls
    pub fn your_agent_id(&self) -> &str {
        &self.your_agent_id
    }

    /// Look up an agent
    pub fn agent(&self, id: &str) -> Result<&Agent> {
        self.all_agents
            .get(id)
            .ok_or_else(|| GameError::UnknownAgent(id.to_string()))
    }

    fn agent_mut(&mut self, id: &str) -> Result<&mut Agent> {
        self.all_agents
            .get_mut(id)
            .ok_or_else(|| GameError::UnknownAgent(id.to_string()))
    }

    /// Every agent, terminated or not
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.all_agents.values()
    }

    /// Whether `id` is a tracked agent
    pub fn is_tracked(&self, id: &str) -> bool {
        self.all_agents.contains_key(id)
    }

    /// Agents still in the game
    pub fn remaining_agent_ids(&self) -> &BTreeSet<String> {
        &self.remaining_agent_ids
    }

    /// Whether `id` is still in the game
    pub fn is_remaining(&self, id: &str) -> bool {
        self.remaining_agent_ids.contains(id)
    }

    /// Agents that were voted out
    pub fn terminated_agent_ids(&self) -> BTreeSet<String> {
        self.all_agents
            .keys()
            .filter(|id| !self.remaining_agent_ids.contains(*id))
            .cloned()
            .collect()
    }

    /// Remaining agents driven by an LLM
    pub fn llm_agent_ids(&self) -> Vec<String> {
        self.remaining_agent_ids
            .iter()
            .filter(|id| **id != self.your_agent_id)
            .cloned()
            .collect()
    }

    /// `(id, persona)` for every agent
    pub fn personas(&self) -> Vec<(String, String)> {
        self.all_agents
            .values()
            .map(|a| (a.id.clone(), a.persona().to_string()))
            .collect()
    }

    /// Replace an agent's persona
    pub fn update_persona(&mut self, id: &str, persona: &str) -> Result<()> {
        self.agent_mut(id)?.update_persona(persona);
        Ok(())
    }

    /// Remove an agent from the game
    pub fn remove_agent(&mut self, id: &str) -> Result<bool> {
        if !self.is_tracked(id) {
            return Err(GameError::UnknownAgent(id.to_string()));
        }
        let removed = self.remaining_agent_ids.remove(id);
        if removed {
            self.events.push(GameEventKind::AgentTerminated {
                agent_id: id.to_string(),
            });
        }
        Ok(removed)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Allocate the next message id
    pub fn next_message_id(&mut self) -> MessageId {
        self.id_generator.next_id()
    }

    /// Full message history
    pub fn messages(&self) -> &MessageHistory {
        &self.messages
    }

    /// Look up a message
    pub fn message(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.get(id)
    }

    /// Event log
    pub fn events(&self) -> &GameEventLog {
        &self.events
    }

    /// Apply a chat message: history, sender bookkeeping, notifications and fan-out
    pub fn add_message(&mut self, message: ChatMessage) -> Result<()> {
        let sender = message.sent_by.clone();
        if !self.is_tracked(&sender) {
            return Err(GameError::UnknownAgent(sender));
        }
        if !self.is_remaining(&sender) {
            return Err(GameError::AgentTerminated(sender));
        }
        if let Some(reply_to) = message.reply_to_id {
            if !self.messages.exists(reply_to) {
                return Err(GameError::UnknownMessage(reply_to.to_string()));
            }
        }
        if let Some(to) = &message.sent_to {
            if !self.is_tracked(to) {
                return Err(GameError::UnknownAgent(to.clone()));
            }
        }

        let id = message.id;
        let sent_to = message.sent_to.clone();
        let impersonated = message.sent_by_you && sender != self.your_agent_id;
        let sent_via_you = impersonated.then(|| formatter::sent_by_human(&message));
        let suspicion = if message.sent_by_you {
            None
        } else {
            formatter::suspicion(&message, self.config.vote_nudge_confidence)
        };

        self.messages.add(message)?;

        let from = self.agent_mut(&sender)?;
        from.add_message_id(id);
        if let Some(note) = sent_via_you {
            from.notify(note);
        }
        if let Some(note) = suspicion {
            from.notify(note);
        }

        let mut recipients = BTreeSet::from([sender.clone()]);
        match &sent_to {
            Some(to) => {
                self.agent_mut(&sender)?.add_dm_message_id(id, to, false);
                self.agent_mut(to)?.add_dm_message_id(id, &sender, true);
                recipients.insert(to.clone());
            }
            None => recipients.extend(self.remaining_agent_ids.iter().cloned()),
        }

        for recipient in &recipients {
            let role = if *recipient == sender {
                Role::Assistant
            } else {
                Role::User
            };
            self.agent_mut(recipient)?
                .add_to_chat_log(role, LogContent::Message(id));
        }

        let was_full = self.speakers.record(&sender);
        if was_full && !self.speakers.contains(&self.your_agent_id) {
            let nudge = formatter::silence_nudge(&self.your_agent_id, &mut rand::thread_rng());
            info!(agent = %sender, "Human has been quiet, nudging");
            self.agent_mut(&sender)?.notify(nudge);
        }

        debug!(id = %id, from = %sender, recipients = recipients.len(), "Message applied");
        Ok(())
    }

    /// Add a system announcement to the history
    pub fn record_announcement(&mut self, text: &str) -> Result<MessageId> {
        let id = self.next_message_id();
        self.messages.add(ChatMessage::announcement(id, text))?;
        Ok(id)
    }

    /// Push an `[IMPORTANT]` notice to every remaining agent
    pub fn announce_to_remaining(&mut self, text: &str) {
        let notice = formatter::announcement(text);
        let ids: Vec<String> = self.remaining_agent_ids.iter().cloned().collect();
        for id in ids {
            if let Some(agent) = self.all_agents.get_mut(&id) {
                agent.notify(notice.clone());
            }
        }
    }

    /// Push a system note to one agent
    pub fn notify(&mut self, agent_id: &str, text: impl Into<String>) -> Result<()> {
        self.agent_mut(agent_id)?.notify(text);
        Ok(())
    }

    /// Edit a message. `Ok(false)` once deleted.
    pub fn edit_message(&mut self, id: MessageId, text: &str, edited_by_you: bool) -> Result<bool> {
        self.ensure_agent_message(id)?;
        let edited = self.messages.edit(id, text, edited_by_you)?;
        if edited && edited_by_you {
            self.notify_if_tampered(id, true)?;
        }
        Ok(edited)
    }

    /// Delete a message. `Ok(false)` if already deleted.
    pub fn delete_message(&mut self, id: MessageId, deleted_by_you: bool) -> Result<bool> {
        self.ensure_agent_message(id)?;
        let deleted = self.messages.delete(id, deleted_by_you)?;
        if deleted && deleted_by_you {
            self.notify_if_tampered(id, false)?;
        }
        Ok(deleted)
    }

    fn ensure_agent_message(&self, id: MessageId) -> Result<()> {
        if self.messages.require(id)?.is_announcement {
            return Err(GameError::Invariant(format!(
                "announcement {id} cannot be modified"
            )));
        }
        Ok(())
    }

    fn notify_if_tampered(&mut self, id: MessageId, is_edit: bool) -> Result<()> {
        let msg = self.messages.require(id)?;
        if msg.sent_by == self.your_agent_id {
            return Ok(());
        }
        let owner = msg.sent_by.clone();
        if let Some(note) = formatter::tampered_by_human(msg, is_edit) {
            info!(agent = %owner, id = %id, is_edit, "Human tampered with a message");
            self.agent_mut(&owner)?.notify(note);
        }
        Ok(())
    }

    /// Resolve an agent's chat log into completion turns.
    ///
    /// Message references render their current text, so edits and deletes
    /// are visible.
    pub fn llm_context(&self, agent_id: &str) -> Result<Vec<ChatTurn>> {
        let agent = self.agent(agent_id)?;
        let mut turns = Vec::with_capacity(agent.chat_logs().len());
        for entry in agent.chat_logs().iter() {
            match &entry.content {
                LogContent::Text(text) => turns.push(ChatTurn::new(entry.role, text.clone())),
                LogContent::Message(id) => match self.messages.get(*id) {
                    Some(msg) => {
                        turns.push(ChatTurn::new(entry.role, formatter::format_to_string(msg)));
                    }
                    None => warn!(agent = %agent_id, id = %id, "Chat log references a missing message"),
                },
            }
        }
        Ok(turns)
    }

    // =========================================================================
    // Voting
    // =========================================================================

    /// Agent that opened the current vote, if one is open
    pub fn voting_status(&self) -> Option<&str> {
        if self.voting.has_started() {
            self.voting.started_by()
        } else {
            None
        }
    }

    /// Open a vote and start the countdown. `false` if one is open or the game ended.
    pub fn start_voting(&mut self, started_by: &str, by_you: bool) -> bool {
        if self.game_ended || !self.voting.start_vote(started_by) {
            return false;
        }
        self.vote_duration_timer = self.config.vote_duration_ms();
        self.events.push(GameEventKind::VoteStarted {
            started_by: started_by.to_string(),
            by_you,
        });
        true
    }

    /// Cast a ballot.
    ///
    /// Unknown ids are errors. Terminated voter or target, a closed vote and
    /// a second ballot are rejected with `Ok(false)`.
    pub fn vote(&mut self, by: &str, target: &str) -> Result<bool> {
        if !self.is_tracked(by) {
            return Err(GameError::UnknownAgent(by.to_string()));
        }
        if !self.is_tracked(target) {
            return Err(GameError::UnknownAgent(target.to_string()));
        }
        if !self.is_remaining(by) {
            warn!(voter = %by, "Terminated agent tried to vote");
            return Ok(false);
        }
        if !self.is_remaining(target) {
            warn!(voter = %by, target = %target, "Vote for a terminated agent ignored");
            return Ok(false);
        }
        Ok(self.voting.vote(by, target))
    }

    /// Ballot target of `by` in the open vote
    pub fn voted_for(&self, by: &str) -> Option<&str> {
        self.voting.voted_for(by)
    }

    /// Whether `by` may still vote
    pub fn can_vote(&self, by: &str) -> bool {
        self.is_remaining(by) && self.voting.can_vote(by)
    }

    /// Whether the open vote can close early
    pub fn can_end_vote(&self) -> bool {
        self.voting.can_end_vote(self.remaining_agent_ids.len())
    }

    /// Close and resolve the open vote
    pub fn end_voting(&mut self) -> Option<VoteResult> {
        let result = self.voting.end_vote(&self.remaining_agent_ids)?;
        self.vote_duration_timer = 0;
        self.events.push(GameEventKind::VoteEnded {
            outcome: result.outcome.clone(),
        });
        Some(result)
    }

    /// Milliseconds left on the open vote
    pub fn vote_time_left_ms(&self) -> i64 {
        self.vote_duration_timer
    }

    /// Whether an open vote ran out of time
    pub fn vote_timer_expired(&self) -> bool {
        self.voting.has_started() && self.vote_duration_timer <= 0
    }

    // =========================================================================
    // Clock and lifecycle
    // =========================================================================

    /// Advance the clocks to `now_ms`. Paused time is not counted.
    pub fn update_duration(&mut self, now_ms: i64) {
        let delta = (now_ms - self.last_update_time).max(0);
        self.last_update_time = now_ms.max(self.last_update_time);
        if self.game_paused || self.game_ended {
            return;
        }
        self.elapsed_duration += delta;
        if self.voting.has_started() {
            self.vote_duration_timer -= delta;
        }
    }

    /// Restart the clock at `now_ms` without counting the gap since the last update
    pub fn resume_clock(&mut self, now_ms: i64) {
        self.last_update_time = now_ms;
    }

    /// Mark the game over and close any open vote
    pub fn end_game(&mut self, won: bool) {
        self.voting.reset();
        self.vote_duration_timer = 0;
        self.game_ended = true;
        self.game_won = won;
        self.events.push(GameEventKind::GameEnded { won });
    }

    /// Restart with the same scenario, agents and personas
    pub fn reset(&mut self) {
        let now = now_ms();
        self.chatroom_id = Uuid::new_v4();
        self.start_time = now;
        self.last_update_time = now;
        self.elapsed_duration = 0;
        self.vote_duration_timer = 0;
        self.game_paused = false;
        self.game_ended = false;
        self.game_won = false;
        self.messages.reset();
        self.id_generator = MessageIdGenerator::new();
        self.events.clear();
        for agent in self.all_agents.values_mut() {
            agent.reset();
        }
        self.remaining_agent_ids = self.all_agents.keys().cloned().collect();
        self.voting.reset();
        self.speakers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OutgoingMessage;

    fn config() -> GameConfig {
        GameConfig {
            silence_window: 3,
            ..Default::default()
        }
    }

    fn state() -> GameState {
        let agents = ["alice", "bob", "carol", "dave"]
            .iter()
            .map(|id| ((*id).to_string(), format!("{id}'s persona")))
            .collect();
        GameState::new(&config(), "mystery", "a snowed-in hotel", agents, "bob").unwrap()
    }

    fn send(state: &mut GameState, out: OutgoingMessage) -> Result<MessageId> {
        let id = state.next_message_id();
        state.add_message(out.into_message(id))?;
        Ok(id)
    }

    fn log_of(state: &GameState, id: &str) -> Vec<(Role, LogContent)> {
        state
            .agent(id)
            .unwrap()
            .chat_logs()
            .iter()
            .map(|e| (e.role, e.content.clone()))
            .collect()
    }

    #[test]
    fn test_new_validates_agents() {
        let two = vec![
            ("a".to_string(), String::new()),
            ("b".to_string(), String::new()),
        ];
        assert!(GameState::new(&config(), "g", "s", two, "a").is_err());

        let three = vec![
            ("a".to_string(), String::new()),
            ("b".to_string(), String::new()),
            ("c".to_string(), String::new()),
        ];
        assert!(matches!(
            GameState::new(&config(), "g", "s", three, "z"),
            Err(GameError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_new_rejects_announcement_sender_id() {
        let agents = vec![
            ("a".to_string(), String::new()),
            ("System".to_string(), String::new()),
            ("c".to_string(), String::new()),
        ];
        assert!(matches!(
            GameState::new(&config(), "g", "s", agents, "a"),
            Err(GameError::Invariant(_))
        ));
    }

    #[test]
    fn test_public_fan_out() {
        let mut state = state();
        let id = send(&mut state, OutgoingMessage::new("alice", "hello")).unwrap();

        assert_eq!(log_of(&state, "alice"), vec![(Role::Assistant, LogContent::Message(id))]);
        for other in ["bob", "carol", "dave"] {
            assert_eq!(log_of(&state, other), vec![(Role::User, LogContent::Message(id))]);
        }
        assert_eq!(state.agent("alice").unwrap().message_ids().collect::<Vec<_>>(), vec![id]);
    }

    #[test]
    fn test_dm_fan_out_and_index() {
        let mut state = state();
        let id = send(&mut state, OutgoingMessage::new("alice", "psst").to("carol")).unwrap();

        assert_eq!(log_of(&state, "carol"), vec![(Role::User, LogContent::Message(id))]);
        assert!(log_of(&state, "dave").is_empty());
        assert_eq!(state.agent("alice").unwrap().dm_message_ids("carol", false), vec![id]);
        assert_eq!(state.agent("carol").unwrap().dm_message_ids("alice", true), vec![id]);
    }

    #[test]
    fn test_rejects_invalid_messages() {
        let mut state = state();
        assert!(matches!(
            send(&mut state, OutgoingMessage::new("mallory", "hi")),
            Err(GameError::UnknownAgent(_))
        ));
        assert!(matches!(
            send(&mut state, OutgoingMessage::new("alice", "hi").to("mallory")),
            Err(GameError::UnknownAgent(_))
        ));
        assert!(matches!(
            send(&mut state, OutgoingMessage::new("alice", "hi").replying_to(MessageId::new(99))),
            Err(GameError::UnknownMessage(_))
        ));

        state.remove_agent("dave").unwrap();
        assert!(matches!(
            send(&mut state, OutgoingMessage::new("dave", "still here?")),
            Err(GameError::AgentTerminated(_))
        ));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_impersonation_notice() {
        let mut state = state();
        let id = send(&mut state, OutgoingMessage::new("carol", "i vote dave").by_human()).unwrap();

        let log = log_of(&state, "carol");
        assert_eq!(log.len(), 2);
        match &log[0] {
            (Role::System, LogContent::Text(text)) => {
                assert_eq!(
                    text,
                    "[IMPORTANT] The human has SENT the following message via you -- 'i vote dave'"
                );
            }
            other => panic!("unexpected entry {other:?}"),
        }
        assert_eq!(log[1], (Role::Assistant, LogContent::Message(id)));
    }

    #[test]
    fn test_suspicion_note_only_for_agent_messages() {
        let mut state = state();
        send(
            &mut state,
            OutgoingMessage::new("alice", "hmm").with_suspicion("bob", 85, "odd timing"),
        )
        .unwrap();
        let log = log_of(&state, "alice");
        assert!(matches!(&log[0], (Role::System, LogContent::Text(t)) if t.contains("consider starting a vote")));

        send(
            &mut state,
            OutgoingMessage::new("carol", "hmm")
                .by_human()
                .with_suspicion("alice", 85, "cover"),
        )
        .unwrap();
        let texts: Vec<_> = log_of(&state, "carol")
            .into_iter()
            .filter_map(|(_, c)| match c {
                LogContent::Text(t) => Some(t),
                LogContent::Message(_) => None,
            })
            .collect();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("SENT the following message via you"));
    }

    #[test]
    fn test_silence_nudge_after_full_window() {
        let mut state = state();
        for _ in 0..3 {
            send(&mut state, OutgoingMessage::new("alice", "talking")).unwrap();
        }
        let nudges = |state: &GameState| {
            log_of(state, "alice")
                .into_iter()
                .filter(|(_, c)| matches!(c, LogContent::Text(t) if t.contains("SHIFT YOUR FOCUS")))
                .count()
        };
        assert_eq!(nudges(&state), 0);

        send(&mut state, OutgoingMessage::new("alice", "still talking")).unwrap();
        assert_eq!(nudges(&state), 1);

        // Once the human speaks, the nudges stop
        send(&mut state, OutgoingMessage::new("bob", "hi")).unwrap();
        send(&mut state, OutgoingMessage::new("alice", "oh hi")).unwrap();
        assert_eq!(nudges(&state), 1);
    }

    #[test]
    fn test_tamper_notices() {
        let mut state = state();
        let id = send(&mut state, OutgoingMessage::new("alice", "i trust carol")).unwrap();

        assert!(state.edit_message(id, "i trust dave", true).unwrap());
        assert!(state.delete_message(id, true).unwrap());
        assert!(!state.edit_message(id, "again", true).unwrap());

        let notes: Vec<String> = log_of(&state, "alice")
            .into_iter()
            .filter_map(|(_, c)| match c {
                LogContent::Text(t) => Some(t),
                LogContent::Message(_) => None,
            })
            .collect();
        assert_eq!(
            notes,
            vec![
                "[IMPORTANT] The human has EDITED your previous message -- 'i trust carol' to 'i trust dave'".to_string(),
                "[IMPORTANT] The human has DELETED your previous message -- 'i trust dave'".to_string(),
            ]
        );
    }

    #[test]
    fn test_human_editing_own_message_is_silent() {
        let mut state = state();
        let id = send(&mut state, OutgoingMessage::new("bob", "typo").by_human()).unwrap();
        assert!(state.edit_message(id, "fixed", true).unwrap());
        assert_eq!(log_of(&state, "bob").len(), 1);
    }

    #[test]
    fn test_llm_context_reflects_edits() {
        let mut state = state();
        let id = send(&mut state, OutgoingMessage::new("alice", "first")).unwrap();
        state.edit_message(id, "second", false).unwrap();

        let turns = state.llm_context("carol").unwrap();
        assert_eq!(turns, vec![ChatTurn::new(Role::User, "[alice] second")]);

        state.delete_message(id, false).unwrap();
        let turns = state.llm_context("carol").unwrap();
        assert_eq!(turns[0].content, format!("[alice] {}", formatter::DELETED_MARKER));
    }

    #[test]
    fn test_vote_rules() {
        let mut state = state();
        assert!(matches!(state.vote("mallory", "bob"), Err(GameError::UnknownAgent(_))));
        assert!(!state.vote("alice", "bob").unwrap());

        assert!(state.start_voting("carol", false));
        assert!(!state.start_voting("alice", false));
        assert_eq!(state.voting_status(), Some("carol"));
        assert_eq!(state.vote_time_left_ms(), 600_000);

        assert!(state.vote("alice", "dave").unwrap());
        assert!(!state.vote("alice", "carol").unwrap());
        assert_eq!(state.voted_for("alice"), Some("dave"));

        state.remove_agent("carol").unwrap();
        assert!(!state.vote("carol", "dave").unwrap());
        assert!(!state.vote("bob", "carol").unwrap());
    }

    #[test]
    fn test_update_duration_skips_paused_time() {
        let mut state = state();
        let t0 = state.last_update_time;
        state.start_voting("alice", false);

        state.update_duration(t0 + 1_000);
        assert_eq!(state.elapsed_duration, 1_000);
        assert_eq!(state.vote_time_left_ms(), 599_000);

        state.game_paused = true;
        state.update_duration(t0 + 5_000);
        assert_eq!(state.elapsed_duration, 1_000);

        state.game_paused = false;
        state.update_duration(t0 + 6_000);
        assert_eq!(state.elapsed_duration, 2_000);

        state.update_duration(t0 + 700_000);
        assert!(state.vote_timer_expired());
    }

    #[test]
    fn test_resume_clock_skips_gap() {
        let mut state = state();
        let t0 = state.last_update_time;
        state.start_voting("alice", false);
        state.update_duration(t0 + 1_000);

        state.resume_clock(t0 + 3_600_000);
        state.update_duration(t0 + 3_601_000);
        assert_eq!(state.elapsed_duration, 2_000);
        assert_eq!(state.vote_time_left_ms(), 598_000);
        assert!(!state.vote_timer_expired());
    }

    #[test]
    fn test_end_game_closes_vote() {
        let mut state = state();
        state.start_voting("alice", false);
        state.end_game(true);
        assert!(state.game_ended && state.game_won);
        assert!(state.voting_status().is_none());
        assert!(!state.start_voting("alice", false));
    }

    #[test]
    fn test_reset_restores_roster() {
        let mut state = state();
        let old_room = state.chatroom_id;
        send(&mut state, OutgoingMessage::new("alice", "hi")).unwrap();
        state.remove_agent("dave").unwrap();
        state.end_game(false);

        state.reset();
        assert_ne!(state.chatroom_id, old_room);
        assert!(state.messages().is_empty());
        assert_eq!(state.remaining_agent_ids().len(), 4);
        assert!(!state.game_ended);
        assert!(state.agent("alice").unwrap().chat_logs().is_empty());
        assert_eq!(state.next_message_id(), MessageId::new(0));
    }
}
