//! Story persistence for save/load functionality.
//!
//! A save holds the complete `StoryState`, history snapshots included, so a
//! loaded story can still be rolled back to any step it had reached.

use crate::state::StoryState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A saved story with all state needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedStory {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (seconds since the Unix epoch).
    pub saved_at: String,

    pub state: StoryState,
}

impl SavedStory {
    pub fn new(state: StoryState) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: timestamp(),
            state,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

/// Create a save file name for a story theme.
pub fn save_path(base_dir: impl AsRef<Path>, theme: &str) -> PathBuf {
    let mut sanitized: String = theme
        .chars()
        .take(40)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        sanitized.push_str("story");
    }
    base_dir
        .as_ref()
        .join(format!("{sanitized}_{}.json", timestamp()))
}

fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}
