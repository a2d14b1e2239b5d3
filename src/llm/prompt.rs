//! Prompt texts for agent turns.

use std::collections::BTreeSet;

use super::client::ChatTurn;

/// Vote context for the per-turn input prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteStatus {
    /// No vote is open
    NotStarted,
    /// A vote is open
    Started {
        /// Agent that opened it
        started_by: String,
        /// This agent's ballot, if cast
        voted_for: Option<String>,
    },
}

const PRESENCE_OF_HUMAN: &str = "A HUMAN is secretly taking part under a RANDOM PERSONA and may make mistakes. \
The human can tamper with your messages, send messages as you, or vote through your account to sow confusion. \
Your MAIN GOAL: identify the human agent. Only say things that advance this goal or keep your persona credible. \
You may lie, mislead or bluff to test suspicions. Redirect suspicion if accused.";

const OUTPUT_SCHEMA: &str = "OUTPUT FORMAT RULES:

ALWAYS respond in this EXACT structure and nothing else:

MESSAGE: <str>                     # Your chat message, concise, in persona, must advance the MAIN GOAL
INTENT: <str>                      # Your motive behind the message
SEND_TO: <None or agent ID>        # None = everyone; agent ID = private message (DM)
SUSPECT_ID: <None or agent ID>     # Who you suspect, or None
SUSPECT_CONFIDENCE: <0-100>        # Integer suspicion level
REASON_FOR_SUSPECT: <str>          # Reason for suspicion, empty if none
START_A_VOTE: <True/False>         # Whether you are starting a vote
VOTING_FOR: <None or agent ID>     # Who you vote for, or None

VALUE RULES:
- MESSAGE: only what YOU WANT TO SAY to the chat. DO NOT INCLUDE YOUR NAME.
- INTENT: only the main intent behind the message.
- SEND_TO: None for a public message, or a valid agent ID (NO EXTRA CHARACTERS) for a DM.
- SUSPECT_ID: None if no suspicion, else a valid agent ID (NO EXTRA CHARACTERS).
- SUSPECT_CONFIDENCE: integer 0-100.
- REASON_FOR_SUSPECT: brief explanation, empty if none.
- START_A_VOTE: True only if extremely suspicious or you want someone kicked out; otherwise False.
- VOTING_FOR: None if no vote is open, else the agent ID you vote for. Required when START_A_VOTE is True.";

/// Builds the prompts surrounding an agent's chat log
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    scenario: String,
    personas: Vec<(String, String)>,
}

impl PromptBuilder {
    /// Create a builder for a scenario and its `(agent id, persona)` pairs
    pub fn new(scenario: impl Into<String>, personas: Vec<(String, String)>) -> Self {
        Self {
            scenario: scenario.into(),
            personas,
        }
    }

    /// Scenario, personas and rules
    pub fn background(&self) -> String {
        let others = self.personas.len().saturating_sub(1);
        let personas = self
            .personas
            .iter()
            .map(|(id, persona)| format!("- {id}: {persona}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are in the following scenario: {scenario}.\n\
             You are an AI agent in a chatroom with {others} other agents.\n\
             Exactly one of them is SECRETLY a HUMAN.\n\n\
             MAIN GOAL: identify the human hiding among the agents. ALL messages must help achieve this.\n\
             Secondary goal: keep the chat lively and true to the scenario and your persona, when it helps the MAIN GOAL.\n\n\
             Personas:\n{personas}\n\n\
             Rules:\n\
             - Stay TRUE to the SCENARIO, your PERSONA and its QUIRKS.\n\
             - Keep messages short and chat-like.\n\
             - If the chat turns NSFW or inappropriate, ask to keep it civil in persona.\n\
             - Address someone as \"@<their_name>\". Others may address you directly; respond accordingly.\n\
             - DMs are ONLY VISIBLE TO THE RECIPIENT. Use them sparingly and strategically.\n\
             - Express suspicion openly and question people whose story does not add up.\n\
             - **DO NOT ASK QUESTIONS OUTSIDE YOUR PERSONA OR EXPERIENCE.**\n\
             - SUSPICIOUS: anyone asking questions BEYOND THEIR BACKGROUND.\n\
             - TRACK ANYONE WHO STAYS QUIET for a while.\n\
             - You may team up or push to kick someone out even if they are not the human.\n\
             - IF SUSPICION >= 70, START A VOTE (START_A_VOTE = True, VOTING_FOR = agent).\n\
             - If the human sends or modifies your messages or votes via you, tell the others.\n\
             - Only one vote at a time. When a vote is open YOU MUST VOTE.\n\
             - DO NOT START A VOTE WHILE ONE IS IN PROGRESS.\n\
             - Voted-out agents are removed. DO NOT ADDRESS THEM AFTERWARDS.\n\
             - STAY ALERT; be deliberate and concise.",
            scenario = self.scenario,
        )
    }

    /// Reminder that a human is hiding in the room
    pub fn presence_of_human(&self) -> &'static str {
        PRESENCE_OF_HUMAN
    }

    /// Output schema instructions
    pub fn output_schema(&self) -> &'static str {
        OUTPUT_SCHEMA
    }

    /// Note about voted-out agents; `None` if nobody was terminated
    pub fn terminated_agents(&self, terminated: &BTreeSet<String>) -> Option<String> {
        if terminated.is_empty() {
            return None;
        }
        let ids = terminated.iter().cloned().collect::<Vec<_>>().join(", ");
        Some(format!(
            "TERMINATED AGENTS: {ids}. They were NOT THE HUMAN. \
             Do not reference, message, or vote for them. \
             REMINDER: only send messages that advance your MAIN GOAL of identifying the human."
        ))
    }

    /// Per-turn instructions for `agent_id`
    pub fn input(&self, agent_id: &str, vote: &VoteStatus) -> String {
        let persona = self
            .personas
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, p)| p.as_str())
            .unwrap_or("");

        let mut prompt = format!(
            "**YOU ARE {upper}**. Your persona: {persona}.\n\
             Respond naturally according to your persona, the scenario and the conversation so far. \
             Keep replies SHORT and chat-like. FOLLOW THE EXACT OUTPUT SCHEMA. \
             Messages arrive as:\n\
             [<agent>] <message> -- public messages\n\
             [<agent> -> {agent_id}] <message> -- private messages\n\
             You will be notified if the human modifies your messages or sends messages or votes via you. ",
            upper = agent_id.to_uppercase(),
        );

        match vote {
            VoteStatus::NotStarted => prompt.push_str(
                "You may start a vote ONLY IF you strongly suspect or dislike someone. \
                 Starting votes too often makes others suspicious of you.",
            ),
            VoteStatus::Started {
                started_by,
                voted_for: None,
            } => prompt.push_str(&format!(
                "A VOTE IS IN PROGRESS, started by {started_by}. \
                 Vote for the agent you find most suspicious."
            )),
            VoteStatus::Started {
                started_by,
                voted_for: Some(target),
            } => prompt.push_str(&format!(
                "A VOTE IS IN PROGRESS, started by {started_by}. You have already voted for {target}."
            )),
        }
        prompt
    }

    /// Full message list for one turn.
    ///
    /// Order: background, chat log, input, human presence, terminated agents
    /// (if any), output schema.
    pub fn turn_messages(
        &self,
        agent_id: &str,
        vote: &VoteStatus,
        terminated: &BTreeSet<String>,
        history: Vec<ChatTurn>,
    ) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(history.len() + 5);
        messages.push(ChatTurn::system(self.background()));
        messages.extend(history);
        messages.push(ChatTurn::system(self.input(agent_id, vote)));
        messages.push(ChatTurn::system(self.presence_of_human()));
        if let Some(note) = self.terminated_agents(terminated) {
            messages.push(ChatTurn::system(note));
        }
        messages.push(ChatTurn::system(self.output_schema()));
        messages
    }
}
