// Conversation module
// Persisted transcript store, token-bounded memory window, and the
// tool-augmented conversation engine over the indexed material.

pub mod engine;
pub mod memory;
pub mod store;

pub use engine::{ConversationEngine, MAX_TOOL_ROUNDS, RETRIEVAL_TOP_K};
pub use memory::{ChatMemoryBuffer, MEMORY_TOKEN_LIMIT};
pub use store::{ChatStore, DEFAULT_STORE_KEY};
