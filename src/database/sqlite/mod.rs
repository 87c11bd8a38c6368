#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

pub use models::{DocumentRecord, IndexRecord, NewDocument, NewNode, NodeRecord};
pub use queries::{DocumentQueries, IndexQueries, NodeQueries};

pub type DbPool = Pool<Sqlite>;

/// Handle to the index catalog database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        if let Some(parent) = database_path.as_ref().parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create catalog directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running catalog migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Catalog migrations completed successfully");
        Ok(())
    }

    pub async fn get_index(&self, id: &str) -> Result<Option<IndexRecord>> {
        IndexQueries::get(&self.pool, id).await
    }

    pub async fn create_index(&self, id: &str) -> Result<IndexRecord> {
        IndexQueries::create(&self.pool, id).await
    }

    pub async fn touch_index(&self, id: &str) -> Result<()> {
        IndexQueries::touch(&self.pool, id).await
    }

    pub async fn upsert_document(&self, document: NewDocument) -> Result<DocumentRecord> {
        DocumentQueries::upsert(&self.pool, document).await
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        DocumentQueries::list_all(&self.pool).await
    }

    pub async fn count_documents(&self) -> Result<i64> {
        DocumentQueries::count(&self.pool).await
    }

    pub async fn insert_node(&self, node: NewNode) -> Result<NodeRecord> {
        NodeQueries::insert(&self.pool, node).await
    }

    pub async fn nodes_for_document(&self, document_id: &str) -> Result<Vec<NodeRecord>> {
        NodeQueries::list_for_document(&self.pool, document_id).await
    }

    pub async fn count_nodes(&self, index_id: &str) -> Result<i64> {
        NodeQueries::count_for_index(&self.pool, index_id).await
    }
}
