use chrono::NaiveDateTime;
use sqlx::FromRow;

/// Catalog row for a persisted index. At most one row exists per index id.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IndexRecord {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Catalog row for an ingested document.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DocumentRecord {
    pub id: String,
    pub file_name: String,
    pub ingested_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub file_name: String,
}

/// Catalog row mapping a node back to its document and index.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct NodeRecord {
    pub id: String,
    pub index_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content_hash: String,
    pub token_count: i64,
    pub summary: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewNode {
    pub id: String,
    pub index_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content_hash: String,
    pub token_count: i64,
    pub summary: String,
}
