// LanceDB vector database module
// Stores node embeddings with their payloads and serves similarity search.

pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{ScoredNode, VectorStore};

/// Embedding record stored in LanceDB, one per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEmbedding {
    /// Node id; shared with the catalog row.
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: NodePayload,
}

/// Node payload stored alongside its embedding so retrieval needs no
/// catalog round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePayload {
    pub document_id: String,
    pub chunk_index: u32,
    pub content_hash: String,
    pub text: String,
    pub summary: String,
    pub token_count: u32,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serialization_round_trip() {
        let payload = NodePayload {
            document_id: "notes.txt".to_string(),
            chunk_index: 2,
            content_hash: "abc123".to_string(),
            text: "chunk text".to_string(),
            summary: "short summary".to_string(),
            token_count: 42,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&payload).expect("can serialize payload");
        let parsed: NodePayload = serde_json::from_str(&json).expect("can parse payload");
        assert_eq!(payload, parsed);
    }
}
