//! Line-oriented `KEY: value` reply parser.
//!
//! ```text
//! MESSAGE: anyone else think bob types oddly fast?
//! INTENT: probe bob
//! SEND_TO: None
//! SUSPECT_ID: bob
//! SUSPECT_CONFIDENCE: 65
//! REASON_FOR_SUSPECT: replies too quickly
//! START_A_VOTE: False
//! VOTING_FOR: None
//! ```
//!
//! Unknown keys and blank lines are skipped, so models that add chatter
//! around the block still parse. The first occurrence of a key wins.

use super::response::{LlmResponse, ResponseError};

/// Keys of the output schema
pub const SCHEMA_KEYS: [&str; 8] = [
    "MESSAGE",
    "INTENT",
    "SEND_TO",
    "SUSPECT_ID",
    "SUSPECT_CONFIDENCE",
    "REASON_FOR_SUSPECT",
    "START_A_VOTE",
    "VOTING_FOR",
];

/// A coerced field value
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    None,
    Bool(bool),
    Int(String),
    Text(String),
}

impl Value {
    fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"');
        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "none" => Value::None,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) => {
                Value::Int(trimmed.to_string())
            }
            _ => Value::Text(trimmed.to_string()),
        }
    }

    fn raw(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(s) | Value::Text(s) => s.clone(),
        }
    }

    /// Optional free text; `none` becomes `None`
    fn into_text(self) -> Option<String> {
        match self {
            Value::None => None,
            other => Some(other.raw()),
        }
    }
}

/// Decode a raw completion into an unvalidated [`LlmResponse`]
pub fn parse(text: &str) -> Result<LlmResponse, ResponseError> {
    if text.trim().is_empty() {
        return Err(ResponseError::Empty);
    }

    let mut fields: [Option<Value>; SCHEMA_KEYS.len()] = Default::default();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let key = line.split(':').next().unwrap_or("").trim();
        let Some(slot) = SCHEMA_KEYS.iter().position(|k| *k == key) else {
            continue;
        };

        let Some((_, value)) = line.split_once(':') else {
            return Err(ResponseError::MalformedLine {
                line: idx + 1,
                text: line.to_string(),
            });
        };

        if fields[slot].is_none() {
            fields[slot] = Some(Value::coerce(value));
        }
    }

    let [message, intent, send_to, suspect, confidence, reason, start_vote, voting_for] = fields;

    Ok(LlmResponse {
        message: required_text("MESSAGE", message)?,
        intent: required_text("INTENT", intent)?,
        send_to: send_to.and_then(Value::into_text),
        suspect: suspect.and_then(Value::into_text),
        suspect_confidence: parse_confidence(confidence)?,
        suspect_reason: reason.and_then(Value::into_text),
        start_a_vote: parse_flag(start_vote)?,
        voting_for: voting_for.and_then(Value::into_text),
    })
}

fn required_text(field: &'static str, value: Option<Value>) -> Result<String, ResponseError> {
    match value {
        None => Err(ResponseError::MissingField(field)),
        Some(Value::None) => Err(ResponseError::InvalidValue {
            field,
            value: "None".to_string(),
            expected: "a string",
        }),
        Some(v) => Ok(v.raw()),
    }
}

fn parse_confidence(value: Option<Value>) -> Result<Option<u32>, ResponseError> {
    match value {
        None | Some(Value::None) => Ok(None),
        Some(Value::Int(digits)) => {
            digits
                .parse::<u32>()
                .map(Some)
                .map_err(|_| ResponseError::InvalidValue {
                    field: "SUSPECT_CONFIDENCE",
                    value: digits,
                    expected: "an integer between 0 and 100",
                })
        }
        Some(other) => Err(ResponseError::InvalidValue {
            field: "SUSPECT_CONFIDENCE",
            value: other.raw(),
            expected: "an integer between 0 and 100",
        }),
    }
}

fn parse_flag(value: Option<Value>) -> Result<bool, ResponseError> {
    match value {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(other) => Err(ResponseError::InvalidValue {
            field: "START_A_VOTE",
            value: other.raw(),
            expected: "True or False",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "MESSAGE: anyone else think bob types oddly fast?\n\
        INTENT: probe bob\n\
        SEND_TO: None\n\
        SUSPECT_ID: bob\n\
        SUSPECT_CONFIDENCE: 65\n\
        REASON_FOR_SUSPECT: replies too quickly\n\
        START_A_VOTE: False\n\
        VOTING_FOR: None\n";

    #[test]
    fn test_parse_full_block() {
        let response = parse(FULL).unwrap();
        assert_eq!(response.message, "anyone else think bob types oddly fast?");
        assert_eq!(response.intent, "probe bob");
        assert_eq!(response.send_to, None);
        assert_eq!(response.suspect.as_deref(), Some("bob"));
        assert_eq!(response.suspect_confidence, Some(65));
        assert!(!response.start_a_vote);
        assert_eq!(response.voting_for, None);
    }

    #[test]
    fn test_skips_chatter_and_blank_lines() {
        let text = "Sure, here is my reply:\n\nMESSAGE: hi\n  \nnotes: whatever\nINTENT: greet\n";
        let response = parse(text).unwrap();
        assert_eq!(response.message, "hi");
        assert_eq!(response.intent, "greet");
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let response = parse("MESSAGE: time check: 5pm\nINTENT: chat").unwrap();
        assert_eq!(response.message, "time check: 5pm");
    }

    #[test]
    fn test_strips_quotes_and_first_key_wins() {
        let text = "MESSAGE: \"quoted\"\nMESSAGE: second\nINTENT: x";
        assert_eq!(parse(text).unwrap().message, "quoted");
    }

    #[test]
    fn test_missing_separator() {
        let err = parse("MESSAGE\nINTENT: x").unwrap_err();
        assert_eq!(
            err,
            ResponseError::MalformedLine {
                line: 1,
                text: "MESSAGE".to_string()
            }
        );
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(
            parse("INTENT: x").unwrap_err(),
            ResponseError::MissingField("MESSAGE")
        );
        assert_eq!(
            parse("MESSAGE: x").unwrap_err(),
            ResponseError::MissingField("INTENT")
        );
    }

    #[test]
    fn test_invalid_flag_and_confidence() {
        let bad_flag = "MESSAGE: x\nINTENT: y\nSTART_A_VOTE: maybe";
        assert!(matches!(
            parse(bad_flag),
            Err(ResponseError::InvalidValue { field: "START_A_VOTE", .. })
        ));

        let bad_conf = "MESSAGE: x\nINTENT: y\nSUSPECT_CONFIDENCE: high";
        assert!(matches!(
            parse(bad_conf),
            Err(ResponseError::InvalidValue { field: "SUSPECT_CONFIDENCE", .. })
        ));
    }

    #[test]
    fn test_numeric_message_kept_as_text() {
        let response = parse("MESSAGE: 42\nINTENT: 7").unwrap();
        assert_eq!(response.message, "42");
        assert_eq!(response.intent, "7");
    }

    #[test]
    fn test_case_insensitive_coercion() {
        let response = parse("MESSAGE: x\nINTENT: y\nSTART_A_VOTE: TRUE\nVOTING_FOR: bob").unwrap();
        assert!(response.start_a_vote);
        assert_eq!(response.voting_for.as_deref(), Some("bob"));
    }

    #[test]
    fn test_empty_completion() {
        assert_eq!(parse("   \n ").unwrap_err(), ResponseError::Empty);
    }
}
