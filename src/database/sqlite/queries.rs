use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::{DocumentRecord, IndexRecord, NewDocument, NewNode, NodeRecord};

pub struct IndexQueries;

impl IndexQueries {
    pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<IndexRecord>> {
        sqlx::query_as::<_, IndexRecord>(
            "SELECT id, created_at, updated_at FROM indexes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get index record")
    }

    pub async fn create(pool: &SqlitePool, id: &str) -> Result<IndexRecord> {
        let now = Utc::now().naive_utc();

        sqlx::query("INSERT INTO indexes (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create index record")?;

        debug!("Created catalog record for index {id}");

        Self::get(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created index record"))
    }

    pub async fn touch(pool: &SqlitePool, id: &str) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE indexes SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update index record")?;

        Ok(())
    }
}

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document, or refresh its ingestion timestamp if the same
    /// file was ingested before.
    pub async fn upsert(pool: &SqlitePool, new_document: NewDocument) -> Result<DocumentRecord> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO documents (id, file_name, ingested_at) VALUES (?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET file_name = excluded.file_name, \
             ingested_at = excluded.ingested_at",
        )
        .bind(&new_document.id)
        .bind(&new_document.file_name)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to upsert document record")?;

        Self::get(pool, &new_document.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve upserted document record"))
    }

    pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<DocumentRecord>> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, file_name, ingested_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document record")
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, file_name, ingested_at FROM documents ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list document records")
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count document records")
    }
}

pub struct NodeQueries;

impl NodeQueries {
    pub async fn insert(pool: &SqlitePool, new_node: NewNode) -> Result<NodeRecord> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO nodes (id, index_id, document_id, chunk_index, content_hash, \
             token_count, summary, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_node.id)
        .bind(&new_node.index_id)
        .bind(&new_node.document_id)
        .bind(new_node.chunk_index)
        .bind(&new_node.content_hash)
        .bind(new_node.token_count)
        .bind(&new_node.summary)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to insert node record")?;

        Self::get(pool, &new_node.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve inserted node record"))
    }

    pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<NodeRecord>> {
        sqlx::query_as::<_, NodeRecord>(
            "SELECT id, index_id, document_id, chunk_index, content_hash, token_count, \
             summary, created_at FROM nodes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get node record")
    }

    pub async fn list_for_document(
        pool: &SqlitePool,
        document_id: &str,
    ) -> Result<Vec<NodeRecord>> {
        sqlx::query_as::<_, NodeRecord>(
            "SELECT id, index_id, document_id, chunk_index, content_hash, token_count, \
             summary, created_at FROM nodes WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("Failed to list node records for document")
    }

    pub async fn count_for_index(pool: &SqlitePool, index_id: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM nodes WHERE index_id = ?")
            .bind(index_id)
            .fetch_one(pool)
            .await
            .context("Failed to count node records")
    }
}
