//! Save and load chatrooms as JSON documents.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::game::GameState;
use crate::chat::now_ms;
use crate::config::{GameConfig, StorageConfig};
use crate::error::{GameError, Result};

/// Save format version
pub const SAVE_VERSION: u32 = 1;

/// On-disk wrapper around a [`GameState`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveFile {
    /// Format version
    pub version: u32,
    /// When the file was written
    pub saved_at: DateTime<Utc>,
    /// The game
    pub state: GameState,
}

/// Default save path for a chatroom
pub fn default_path(storage: &StorageConfig, chatroom_id: Uuid) -> PathBuf {
    storage.save_directory.join(format!("{chatroom_id}.json"))
}

/// Write `state` to `path`, creating parent directories
pub fn save(state: &GameState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = SaveFile {
        version: SAVE_VERSION,
        saved_at: Utc::now(),
        state: state.clone(),
    };
    fs::write(path, serde_json::to_string_pretty(&file)?)?;
    info!(path = %path.display(), chatroom = %state.chatroom_id, "Chatroom saved");
    Ok(())
}

/// Read a save and re-apply the bounds from `config`.
///
/// The clock restarts at load time, so time spent on disk is not counted.
pub fn load(path: &Path, config: &GameConfig) -> Result<GameState> {
    let content = fs::read_to_string(path)?;
    let file: SaveFile = serde_json::from_str(&content)?;
    if file.version != SAVE_VERSION {
        return Err(GameError::Config(format!(
            "unsupported save version {} (expected {SAVE_VERSION})",
            file.version
        )));
    }
    let mut state = file.state;
    state.apply_config(config);
    state.resume_clock(now_ms());
    info!(path = %path.display(), chatroom = %state.chatroom_id, "Chatroom loaded");
    Ok(state)
}
