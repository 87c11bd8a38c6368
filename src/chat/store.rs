use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, Role};

/// Store key for the single local session. A multi-user deployment would
/// key conversations per user instead.
pub const DEFAULT_STORE_KEY: &str = "0";

/// Durable conversation transcript, a keyed list of messages persisted as
/// JSON after every completed turn.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChatStore {
    conversations: HashMap<String, Vec<ChatMessage>>,
}

impl ChatStore {
    /// Load the transcript file. `Ok(None)` when it does not exist yet; an
    /// error when it exists but cannot be parsed.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript file: {}", path.display()))?;

        let store: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse transcript file: {}", path.display()))?;

        Ok(Some(store))
    }

    /// Load the transcript, starting empty on a first run. A corrupt file is
    /// moved aside to a `.corrupt` backup so no previously persisted turns
    /// are silently destroyed, and the store starts empty.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(store)) => {
                debug!("Loaded transcript with {} conversations", store.conversations.len());
                store
            }
            Ok(None) => {
                debug!("No transcript found, starting a new conversation");
                Self::default()
            }
            Err(error) => {
                let backup = backup_path(path);
                warn!(
                    "Transcript file is corrupt ({error}); moving it to {} and starting empty",
                    backup.display()
                );
                if let Err(rename_error) = std::fs::rename(path, &backup) {
                    warn!("Failed to back up corrupt transcript: {rename_error}");
                }
                Self::default()
            }
        }
    }

    pub fn messages(&self, key: &str) -> &[ChatMessage] {
        self.conversations
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn append(&mut self, key: &str, message: ChatMessage) {
        self.conversations
            .entry(key.to_string())
            .or_default()
            .push(message);
    }

    pub fn extend(&mut self, key: &str, messages: impl IntoIterator<Item = ChatMessage>) {
        self.conversations
            .entry(key.to_string())
            .or_default()
            .extend(messages);
    }

    /// Overwrite the transcript file with the current conversations.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create transcript directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize transcript")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write transcript file: {}", path.display()))?;

        debug!("Persisted transcript to {}", path.display());
        Ok(())
    }

    /// Prior conversation as shown to the user: tool-role entries and
    /// entries without content are not rendered.
    pub fn rendered_history(&self, key: &str) -> Vec<&ChatMessage> {
        self.messages(key)
            .iter()
            .filter(|message| message.role != Role::Tool && !message.text().is_empty())
            .collect()
    }
}

fn backup_path(path: &Path) -> std::path::PathBuf {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupt");
    backup.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_transcript_starts_empty() {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let path = temp_dir.path().join("conversation.json");

        let store = ChatStore::load(&path);
        assert!(store.messages(DEFAULT_STORE_KEY).is_empty());
    }

    #[test]
    fn transcript_round_trip_preserves_order() {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let path = temp_dir.path().join("conversation.json");

        let mut store = ChatStore::default();
        store.append(DEFAULT_STORE_KEY, ChatMessage::user("first question"));
        store.append(DEFAULT_STORE_KEY, ChatMessage::assistant("first answer"));
        store.append(DEFAULT_STORE_KEY, ChatMessage::user("second question"));
        store.append(DEFAULT_STORE_KEY, ChatMessage::assistant("second answer"));
        store.persist(&path).expect("can persist transcript");

        let reloaded = ChatStore::load(&path);
        let messages = reloaded.messages(DEFAULT_STORE_KEY);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].text(), "first question");
        assert_eq!(messages[3].text(), "second answer");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn corrupt_transcript_is_backed_up_and_replaced() {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let path = temp_dir.path().join("conversation.json");
        std::fs::write(&path, "{ broken").expect("can write corrupt file");

        let store = ChatStore::load(&path);
        assert!(store.messages(DEFAULT_STORE_KEY).is_empty());

        let backup = temp_dir.path().join("conversation.json.corrupt");
        assert!(backup.exists());
        assert_eq!(
            std::fs::read_to_string(backup).expect("can read backup"),
            "{ broken"
        );
    }

    #[test]
    fn rendering_excludes_tool_and_empty_entries() {
        let mut store = ChatStore::default();
        store.append(DEFAULT_STORE_KEY, ChatMessage::user("question"));
        store.append(
            DEFAULT_STORE_KEY,
            ChatMessage {
                role: Role::Assistant,
                content: None,
                tool_calls: None,
                tool_call_id: None,
            },
        );
        store.append(DEFAULT_STORE_KEY, ChatMessage::tool("call_1", "tool output"));
        store.append(DEFAULT_STORE_KEY, ChatMessage::assistant("answer"));

        let rendered = store.rendered_history(DEFAULT_STORE_KEY);
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].text(), "question");
        assert_eq!(rendered[1].text(), "answer");
    }

    #[test]
    fn keys_isolate_conversations() {
        let mut store = ChatStore::default();
        store.append("0", ChatMessage::user("for key zero"));
        store.append("1", ChatMessage::user("for key one"));

        assert_eq!(store.messages("0").len(), 1);
        assert_eq!(store.messages("1").len(), 1);
        assert_eq!(store.messages("2").len(), 0);
    }
}
