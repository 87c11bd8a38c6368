// Session store module
// Saves, restores and clears the user's session state as a human-readable
// TOML record. Absence of the record means a first-time user.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::StudyError;
use crate::config::Config;

/// Flat session record persisted between application runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub study_subject: String,
    #[serde(default)]
    pub uploaded_files: Vec<String>,
    #[serde(default)]
    pub finish_upload: bool,
    #[serde(default)]
    pub show_quiz: bool,
    #[serde(default)]
    pub quiz_running: bool,
}

pub fn save_session(state: &SessionState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create session directory: {}", parent.display())
        })?;
    }

    let content = toml::to_string_pretty(state).context("Failed to serialize session state")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write session file: {}", path.display()))?;

    debug!("Saved session to {}", path.display());
    Ok(())
}

/// Load the session record. `Ok(None)` when no session exists (a first-time
/// user); a corrupt-session error when the file exists but cannot be parsed.
pub fn load_session(path: &Path) -> Result<Option<SessionState>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;

    let state: SessionState = toml::from_str(&content)
        .map_err(|error| StudyError::SessionCorrupt(error.to_string()))?;

    Ok(Some(state))
}

/// Delete everything belonging to the session: the session record, the
/// conversation transcript, every uploaded file, and the in-memory state.
pub fn delete_session(state: &mut SessionState, config: &Config) -> Result<()> {
    let session_file = config
        .session_file()
        .context("Failed to resolve session file path")?;
    if session_file.exists() {
        std::fs::remove_file(&session_file)
            .with_context(|| format!("Failed to delete {}", session_file.display()))?;
    }

    let conversation_file = config
        .conversation_file()
        .context("Failed to resolve transcript path")?;
    if conversation_file.exists() {
        std::fs::remove_file(&conversation_file)
            .with_context(|| format!("Failed to delete {}", conversation_file.display()))?;
    }

    let upload_dir = config
        .upload_dir()
        .context("Failed to resolve upload directory")?;
    if upload_dir.exists() {
        for entry in std::fs::read_dir(&upload_dir)
            .with_context(|| format!("Failed to read {}", upload_dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() || path.is_symlink() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))?;
            }
        }
    }

    *state = SessionState::default();
    info!("Session deleted");
    Ok(())
}
