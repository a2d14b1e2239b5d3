//! Recent-speaker tracking.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Window of the most recent message senders with per-sender counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerWindow {
    window: VecDeque<String>,
    counts: BTreeMap<String, usize>,
    capacity: usize,
}

impl SpeakerWindow {
    /// Create a window tracking the last `capacity` senders
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            counts: BTreeMap::new(),
            capacity,
        }
    }

    /// Record a sender. Returns whether the window was already full.
    pub fn record(&mut self, agent_id: &str) -> bool {
        let was_full = self.window.len() >= self.capacity;
        while self.window.len() >= self.capacity {
            if let Some(oldest) = self.window.pop_front() {
                if let Some(count) = self.counts.get_mut(&oldest) {
                    *count -= 1;
                    if *count == 0 {
                        self.counts.remove(&oldest);
                    }
                }
            }
        }
        self.window.push_back(agent_id.to_string());
        *self.counts.entry(agent_id.to_string()).or_insert(0) += 1;
        was_full
    }

    /// Whether `agent_id` spoke within the window
    pub fn contains(&self, agent_id: &str) -> bool {
        self.counts.contains_key(agent_id)
    }

    /// Messages `agent_id` sent within the window
    pub fn count(&self, agent_id: &str) -> usize {
        self.counts.get(agent_id).copied().unwrap_or(0)
    }

    /// Number of senders tracked
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether nothing was recorded yet
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Change the window size, dropping the oldest senders if needed
    pub fn set_capacity(&mut self, capacity: usize) {
        let senders: Vec<String> = self.window.drain(..).collect();
        let keep_from = senders.len().saturating_sub(capacity.max(1));
        *self = Self::new(capacity);
        for sender in &senders[keep_from..] {
            self.record(sender);
        }
    }

    /// Forget everyone
    pub fn clear(&mut self) {
        self.window.clear();
        self.counts.clear();
    }
}
