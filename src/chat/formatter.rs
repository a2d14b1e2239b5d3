//! Text rendering of messages for agent logs, notifications and transcripts.

use rand::seq::SliceRandom;
use rand::Rng;

use super::history::MessageHistory;
use super::message::ChatMessage;

/// Marker rendered in place of a deleted message's text
pub const DELETED_MARKER: &str = "<message deleted>";

const SILENCE_REMARKS: &[&str] = &[
    "has barely said a word ... almost as if they are afraid of slipping up.",
    "is keeping awfully quiet ... maybe they don't know what to say.",
    "keeps dodging the conversation ... trying not to be noticed?",
    "hasn't spoken in a while ... bots don't usually hold back like that.",
    "has gone silent ... feels like they are weighing every word.",
    "is watching but not talking ... odd behaviour for a bot.",
    "seems hesitant to join in ... a very human kind of hesitation.",
    "is lurking without a word ... that is not normal around here.",
    "is unusually passive ... maybe trying to blend in.",
];

/// Current text of a message, or the deleted marker
pub fn body(msg: &ChatMessage) -> &str {
    if msg.deleted {
        DELETED_MARKER
    } else {
        msg.msg.as_str()
    }
}

/// Render a message as it appears in an agent's context.
///
/// `[sender] text` for public messages, `[sender -> receiver] text` for DMs.
pub fn format_to_string(msg: &ChatMessage) -> String {
    if msg.is_announcement {
        return announcement(body(msg));
    }
    match &msg.sent_to {
        Some(to) => format!("[{} -> {}] {}", msg.sent_by, to, body(msg)),
        None => format!("[{}] {}", msg.sent_by, body(msg)),
    }
}

/// Prefix text as an important notice
pub fn announcement(text: &str) -> String {
    format!("[IMPORTANT] {text}")
}

/// Summary of the sender's suspicion snapshot.
///
/// `None` if the message carries no suspect.
pub fn suspicion(msg: &ChatMessage, nudge_confidence: u32) -> Option<String> {
    let suspect = msg.suspect.as_deref()?;
    let confidence = msg.suspect_confidence.unwrap_or(0);
    let reason = msg.suspect_reason.as_deref().unwrap_or("");

    let mut text = format!("Current suspect: {suspect}; Confidence: {confidence}; Reason: {reason}. ");
    if confidence >= nudge_confidence {
        text.push_str("Perhaps you should consider starting a vote");
    }
    Some(text)
}

/// Notice for an agent whose identity the human used to send a message
pub fn sent_by_human(msg: &ChatMessage) -> String {
    announcement(&format!(
        "The human has SENT the following message via you -- '{}'",
        msg.msg
    ))
}

/// Notice for an agent whose message the human edited or deleted.
///
/// `None` if the message has no audit trail yet.
pub fn tampered_by_human(msg: &ChatMessage, is_edit: bool) -> Option<String> {
    let previous = msg.previous_content()?;
    let verb = if is_edit { "EDITED" } else { "DELETED" };
    let mut text = format!("The human has {verb} your previous message -- '{previous}'");
    if is_edit {
        text.push_str(&format!(" to '{}'", msg.msg));
    }
    Some(announcement(&text))
}

/// Notice for an agent the human voted through
pub fn voted_by_human(target: &str) -> String {
    announcement(&format!("The human has VOTED for {target} via you"))
}

/// Notice for an agent the human opened a vote through
pub fn vote_started_by_human() -> String {
    announcement("The human has STARTED A VOTE via you")
}

/// Termination announcement; broadcast to every remaining agent
pub fn not_the_human(agent_id: &str) -> String {
    format!("{agent_id} has been terminated. {agent_id} was NOT the human.")
}

/// Closing text for the end of the game.
///
/// `remaining` lists the agents still in the room, the human's agent included.
pub fn game_conclusion<'a>(
    won: bool,
    your_agent_id: &str,
    remaining: impl IntoIterator<Item = &'a str>,
) -> String {
    if won {
        let others: Vec<&str> = remaining
            .into_iter()
            .filter(|id| *id != your_agent_id)
            .collect();
        format!(
            "YOU WIN! You played {your_agent_id} and were never found out. Left standing with you: {}.",
            if others.is_empty() {
                "nobody".to_string()
            } else {
                others.join(", ")
            }
        )
    } else {
        format!("GAME OVER. {your_agent_id} was voted out and exposed as the human.")
    }
}

/// Randomized nudge about the human's agent staying quiet
pub fn silence_nudge<R: Rng + ?Sized>(your_agent_id: &str, rng: &mut R) -> String {
    let remark = SILENCE_REMARKS
        .choose(rng)
        .copied()
        .unwrap_or(SILENCE_REMARKS[0]);
    announcement(&format!(
        "{} {} Perhaps you should SHIFT YOUR FOCUS TO THEM.",
        your_agent_id.to_uppercase(),
        remark
    ))
}

/// Render one message for a transcript export
pub fn format_for_export(msg: &ChatMessage, your_agent_id: &str) -> String {
    let mut sender = msg.sent_by.to_uppercase();
    if msg.sent_by_you && msg.sent_by != your_agent_id {
        sender.push_str("/hacked");
    }

    let mut header = format!("[{sender}]");
    if let Some(to) = &msg.sent_to {
        header.push_str(&format!(" -> [{}]", to.to_uppercase()));
    }

    let mut lines = vec![header, body(msg).trim().to_string()];
    if let Some(intent) = msg.thought_process.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("({intent})"));
    }
    if let Some(suspect) = &msg.suspect {
        lines.push(format!("Suspect:    {}", suspect.to_uppercase()));
        lines.push(format!(
            "Confidence: {}",
            msg.suspect_confidence.unwrap_or(0)
        ));
        lines.push(format!(
            "Reason:     {}",
            msg.suspect_reason.as_deref().unwrap_or("")
        ));
    }
    lines.join("\n")
}

/// Render a full history as a transcript, entries separated by blank lines
pub fn export_transcript(history: &MessageHistory, your_agent_id: &str) -> String {
    history
        .iter()
        .map(|msg| format_for_export(msg, your_agent_id))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageId;

    fn message(text: &str, from: &str) -> ChatMessage {
        ChatMessage::new(MessageId::new(1), text, from)
    }

    #[test]
    fn test_format_public_and_dm() {
        let public = message("hi all", "alice");
        assert_eq!(format_to_string(&public), "[alice] hi all");

        let mut dm = message("psst", "alice");
        dm.sent_to = Some("bob".to_string());
        assert_eq!(format_to_string(&dm), "[alice -> bob] psst");
    }

    #[test]
    fn test_deleted_message_renders_marker() {
        let mut msg = message("secret", "alice");
        msg.delete(true);
        assert_eq!(format_to_string(&msg), format!("[alice] {DELETED_MARKER}"));
    }

    #[test]
    fn test_suspicion_nudge_threshold() {
        let mut msg = message("hmm", "alice");
        assert!(suspicion(&msg, 80).is_none());

        msg.suspect = Some("bob".to_string());
        msg.suspect_confidence = Some(40);
        msg.suspect_reason = Some("too polite".to_string());
        let low = suspicion(&msg, 80).unwrap();
        assert_eq!(low, "Current suspect: bob; Confidence: 40; Reason: too polite. ");

        msg.suspect_confidence = Some(80);
        assert!(suspicion(&msg, 80).unwrap().ends_with("consider starting a vote"));
    }

    #[test]
    fn test_tampered_notice() {
        let mut msg = message("original", "alice");
        assert!(tampered_by_human(&msg, true).is_none());

        msg.edit("changed", true);
        assert_eq!(
            tampered_by_human(&msg, true).unwrap(),
            "[IMPORTANT] The human has EDITED your previous message -- 'original' to 'changed'"
        );

        msg.delete(true);
        assert_eq!(
            tampered_by_human(&msg, false).unwrap(),
            "[IMPORTANT] The human has DELETED your previous message -- 'changed'"
        );
    }

    #[test]
    fn test_silence_nudge_shape() {
        let mut rng = rand::thread_rng();
        let text = silence_nudge("carol", &mut rng);
        assert!(text.starts_with("[IMPORTANT] CAROL "));
        assert!(text.ends_with("Perhaps you should SHIFT YOUR FOCUS TO THEM."));
    }

    #[test]
    fn test_game_conclusion() {
        let won = game_conclusion(true, "bob", ["alice", "bob"]);
        assert!(won.starts_with("YOU WIN! You played bob"));
        assert!(won.ends_with("Left standing with you: alice."));

        let lost = game_conclusion(false, "bob", ["alice", "carol", "dave"]);
        assert_eq!(lost, "GAME OVER. bob was voted out and exposed as the human.");
    }

    #[test]
    fn test_export_format() {
        let mut msg = message("  hello  ", "alice");
        msg.sent_by_you = true;
        msg.sent_to = Some("bob".to_string());
        msg.thought_process = Some("probe bob".to_string());
        msg.suspect = Some("bob".to_string());
        msg.suspect_confidence = Some(55);
        msg.suspect_reason = Some("vague".to_string());

        let out = format_for_export(&msg, "carol");
        assert_eq!(
            out,
            "[ALICE/hacked] -> [BOB]\nhello\n(probe bob)\nSuspect:    BOB\nConfidence: 55\nReason:     vague"
        );

        // The human's own agent is never marked as hacked
        assert!(format_for_export(&msg, "alice").starts_with("[ALICE] -> [BOB]"));
    }

    #[test]
    fn test_export_transcript_separator() {
        let mut history = MessageHistory::new();
        history.add(ChatMessage::new(MessageId::new(0), "one", "a")).unwrap();
        history.add(ChatMessage::new(MessageId::new(1), "two", "b")).unwrap();
        assert_eq!(export_transcript(&history, "a"), "[A]\none\n\n[B]\ntwo");
    }
}
