// Storage module
// SQLite holds the index catalog (document <-> node mapping); LanceDB holds
// the node embeddings and payloads for similarity search.

pub mod lancedb;
pub mod sqlite;
