use crate::ingest::estimate_token_count;
use crate::llm::{ChatMessage, Role};

/// Token budget for the conversation window handed to the model.
pub const MEMORY_TOKEN_LIMIT: usize = 3000;

/// Token-bounded view over the transcript: the newest conversational turns
/// that fit the budget, oldest evicted first.
#[derive(Debug, Clone, Copy)]
pub struct ChatMemoryBuffer {
    token_limit: usize,
}

impl ChatMemoryBuffer {
    pub fn new(token_limit: usize) -> Self {
        Self { token_limit }
    }

    pub fn from_defaults() -> Self {
        Self::new(MEMORY_TOKEN_LIMIT)
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Select the window to replay to the model. Only user and assistant
    /// turns with content participate; tool exchanges stay in the transcript
    /// but are not replayed across turns.
    pub fn window(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut selected = Vec::new();
        let mut total_tokens = 0;

        for message in messages.iter().rev() {
            if !is_conversational(message) {
                continue;
            }

            let cost = estimate_token_count(message.text());
            if total_tokens + cost > self.token_limit {
                break;
            }

            total_tokens += cost;
            selected.push(message.clone());
        }

        selected.reverse();
        selected
    }
}

fn is_conversational(message: &ChatMessage) -> bool {
    matches!(message.role, Role::User | Role::Assistant)
        && !message.text().is_empty()
        && !message.has_tool_calls()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(count: usize, words_each: usize) -> Vec<ChatMessage> {
        (0..count)
            .map(|i| {
                let text = format!("word{i} ").repeat(words_each);
                if i % 2 == 0 {
                    ChatMessage::user(text)
                } else {
                    ChatMessage::assistant(text)
                }
            })
            .collect()
    }

    #[test]
    fn window_never_exceeds_the_token_budget() {
        let memory = ChatMemoryBuffer::new(100);
        let messages = turns(50, 10);

        let window = memory.window(&messages);
        let total: usize = window.iter().map(|m| estimate_token_count(m.text())).sum();

        assert!(!window.is_empty());
        assert!(total <= 100, "window of {total} tokens exceeds the budget");
    }

    #[test]
    fn the_newest_turns_survive_eviction() {
        let memory = ChatMemoryBuffer::new(50);
        let messages = turns(20, 10);

        let window = memory.window(&messages);
        let last = window.last().expect("window keeps the newest turn");
        assert_eq!(last, messages.last().expect("messages not empty"));
    }

    #[test]
    fn everything_fits_under_a_large_budget() {
        let memory = ChatMemoryBuffer::from_defaults();
        let messages = turns(6, 5);

        let window = memory.window(&messages);
        assert_eq!(window.len(), 6);
        assert_eq!(window, messages);
    }

    #[test]
    fn tool_exchanges_are_not_replayed() {
        let memory = ChatMemoryBuffer::from_defaults();
        let messages = vec![
            ChatMessage::user("question"),
            ChatMessage::tool("call_1", "tool output"),
            ChatMessage::assistant("answer"),
        ];

        let window = memory.window(&messages);
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|m| m.role != Role::Tool));
    }
}
