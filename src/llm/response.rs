//! Typed LLM actions and their validation against the live agent set.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors decoding or validating an LLM reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// A recognized key without a `:` separator
    #[error("Line {line} has no ':' separator: '{text}'. DOES NOT MATCH THE OUTPUT SCHEMA")]
    MalformedLine {
        /// 1-based line number
        line: usize,
        /// Offending line
        text: String,
    },

    /// A required key is absent
    #[error("Missing required field {0}. DOES NOT MATCH THE OUTPUT SCHEMA")]
    MissingField(&'static str),

    /// A value of the wrong type
    #[error("Field {field} has invalid value '{value}', expected {expected}")]
    InvalidValue {
        /// Schema key
        field: &'static str,
        /// Value as written
        value: String,
        /// What was expected
        expected: &'static str,
    },

    /// An agent id outside the allow-list
    #[error("Agent ID ({id}) not in the allowed set: [{allowed}]")]
    UnknownAgent {
        /// Id as written
        id: String,
        /// Allowed ids, comma separated
        allowed: String,
    },

    /// `START_A_VOTE` without a ballot
    #[error("START_A_VOTE=True but didn't vote for any agent (VOTING_FOR=None)")]
    VoteWithoutTarget,

    /// The completion was empty
    #[error("Empty completion")]
    Empty,
}

/// A decoded and validated agent action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Text to post
    pub message: String,
    /// Motive behind the message
    pub intent: String,
    /// DM recipient; `None` for public
    pub send_to: Option<String>,
    /// Current suspect
    pub suspect: Option<String>,
    /// Suspicion level (0-100)
    pub suspect_confidence: Option<u32>,
    /// Why the suspect is suspected
    pub suspect_reason: Option<String>,
    /// Open a vote after sending
    pub start_a_vote: bool,
    /// Ballot target if a vote is open
    pub voting_for: Option<String>,
}

impl LlmResponse {
    /// Check agent references against the allow-list and canonicalise them
    pub fn validate(mut self, allowed: &AllowedIds) -> Result<Self, ResponseError> {
        if let Some(id) = self.send_to.take() {
            self.send_to = Some(allowed.canonicalize(&id)?);
        }
        if let Some(id) = self.voting_for.take() {
            self.voting_for = Some(allowed.canonicalize(&id)?);
        }
        if self.start_a_vote && self.voting_for.is_none() {
            return Err(ResponseError::VoteWithoutTarget);
        }
        Ok(self)
    }
}

/// Shared, refreshable set of agent ids an LLM may address.
///
/// Lookups are case-insensitive and resolve to the tracked spelling. The
/// handle is cheap to clone; all clones see the same set.
#[derive(Debug, Clone, Default)]
pub struct AllowedIds {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl AllowedIds {
    /// Create an allow-list from ids
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = Self::default();
        allowed.set(ids);
        allowed
    }

    /// Replace the set
    pub fn set<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let map = ids
            .into_iter()
            .map(|id| (id.as_ref().to_lowercase(), id.as_ref().to_string()))
            .collect();
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = map;
    }

    /// Resolve `id` to its tracked spelling
    pub fn canonicalize(&self, id: &str) -> Result<String, ResponseError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&id.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| ResponseError::UnknownAgent {
                id: id.to_string(),
                allowed: map.values().cloned().collect::<Vec<_>>().join(", "),
            })
    }

    /// Whether `id` is allowed (case-insensitive)
    pub fn contains(&self, id: &str) -> bool {
        self.canonicalize(id).is_ok()
    }

    /// Current ids, sorted
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
