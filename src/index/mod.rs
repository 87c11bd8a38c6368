// Index manager module
// Owns the persisted vector index: fresh create on first run, additive merge
// afterwards, always durably persisted before a build call returns.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::StudyError;
use crate::config::Config;
use crate::database::lancedb::{NodeEmbedding, NodePayload, ScoredNode, VectorStore};
use crate::database::sqlite::{Database, DocumentRecord, NewDocument, NewNode};
use crate::ingest::Node;
use crate::llm::OpenAiClient;

/// The one index id this application uses.
pub const VECTOR_INDEX_ID: &str = "vector";

/// A chunk handed back from retrieval, ready for prompt assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub text: String,
    pub summary: String,
    pub score: f32,
}

/// Read-only retrieval over indexed material. Behind a trait so the chat
/// engine can be exercised without a provider or an on-disk index.
#[async_trait]
pub trait Retriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>>;
}

/// Summary counts for the `status` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: i64,
    pub nodes: i64,
    pub embeddings: u64,
}

/// A loaded index: catalog (document <-> node mapping) plus vector store.
pub struct StudyIndex {
    id: String,
    catalog: Database,
    vectors: VectorStore,
}

impl StudyIndex {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Additive insert: new nodes are recorded in the catalog and the vector
    /// store; existing nodes are never touched.
    pub async fn insert_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        if nodes.is_empty() {
            debug!("No nodes to insert");
            return Ok(());
        }

        let mut seen_documents = HashSet::new();
        for node in nodes {
            if seen_documents.insert(node.document_id.as_str()) {
                self.catalog
                    .upsert_document(NewDocument {
                        id: node.document_id.clone(),
                        file_name: node.document_id.clone(),
                    })
                    .await
                    .context("Failed to record document in catalog")?;
            }
        }

        let created_at = Utc::now().to_rfc3339();
        let mut records = Vec::with_capacity(nodes.len());
        for node in nodes {
            self.catalog
                .insert_node(NewNode {
                    id: node.id.clone(),
                    index_id: self.id.clone(),
                    document_id: node.document_id.clone(),
                    chunk_index: node.chunk_index as i64,
                    content_hash: node.content_hash.clone(),
                    token_count: node.token_count as i64,
                    summary: node.summary.clone(),
                })
                .await
                .context("Failed to record node in catalog")?;

            records.push(NodeEmbedding {
                id: node.id.clone(),
                vector: node.embedding.clone(),
                payload: NodePayload {
                    document_id: node.document_id.clone(),
                    chunk_index: node.chunk_index as u32,
                    content_hash: node.content_hash.clone(),
                    text: node.text.clone(),
                    summary: node.summary.clone(),
                    token_count: node.token_count as u32,
                    created_at: created_at.clone(),
                },
            });
        }

        self.vectors
            .insert_batch(&records)
            .await
            .context("Failed to store node embeddings")?;

        info!("Inserted {} nodes into index \"{}\"", nodes.len(), self.id);
        Ok(())
    }

    pub async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredNode>> {
        self.vectors
            .search(query_vector, top_k)
            .await
            .context("Vector search failed")
    }

    /// The catalog's ingested documents, in id order.
    pub async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        self.catalog.list_documents().await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.catalog.count_documents().await?,
            nodes: self.catalog.count_nodes(&self.id).await?,
            embeddings: self.vectors.count().await?,
        })
    }

    /// Retrieval view over this index with a fixed result budget.
    pub fn retriever<'a>(&'a self, client: &'a OpenAiClient, top_k: usize) -> StudyRetriever<'a> {
        StudyRetriever {
            index: self,
            client,
            top_k,
        }
    }
}

pub struct StudyRetriever<'a> {
    index: &'a StudyIndex,
    client: &'a OpenAiClient,
    top_k: usize,
}

#[async_trait]
impl Retriever for StudyRetriever<'_> {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self
            .client
            .embed(query)
            .context("Failed to embed retrieval query")?;

        let scored = self.index.search(&query_vector, self.top_k).await?;

        Ok(scored
            .into_iter()
            .map(|result| RetrievedChunk {
                document_id: result.payload.document_id,
                text: result.payload.text,
                summary: result.payload.summary,
                score: result.similarity,
            })
            .collect())
    }
}

/// Creates, updates and opens the persisted index at the configured storage
/// location.
pub struct IndexManager {
    index_dir: PathBuf,
}

impl IndexManager {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            index_dir: config
                .index_dir()
                .context("Failed to resolve index directory")?,
        })
    }

    fn catalog_path(&self) -> PathBuf {
        self.index_dir.join("catalog.db")
    }

    fn vectors_dir(&self) -> PathBuf {
        self.index_dir.join("vectors")
    }

    fn lock_path(&self) -> PathBuf {
        self.index_dir.join(".index.lock")
    }

    /// Attempt to load a persisted index. `Ok(None)` when none has been
    /// built yet; that is the expected first-run condition, not a fault.
    pub async fn try_load(&self, index_id: &str) -> Result<Option<StudyIndex>> {
        let catalog = Database::new(self.catalog_path())
            .await
            .context("Failed to open index catalog")?;

        let Some(record) = catalog.get_index(index_id).await? else {
            debug!("No persisted index with id \"{index_id}\"");
            return Ok(None);
        };

        let vectors = VectorStore::open(&self.vectors_dir(), index_id)
            .await
            .context("Failed to open vector store")?;

        debug!(
            "Loaded index \"{}\" (created {})",
            record.id, record.created_at
        );

        Ok(Some(StudyIndex {
            id: record.id,
            catalog,
            vectors,
        }))
    }

    /// Open an existing index for reading; fails when none has been built.
    pub async fn open(&self, index_id: &str) -> Result<StudyIndex> {
        self.try_load(index_id)
            .await?
            .ok_or_else(|| StudyError::IndexUnavailable(index_id.to_string()).into())
    }

    /// Merge nodes into the persisted index, creating it on first run.
    /// Either path ends with the index durably persisted before returning.
    /// The whole sequence holds an advisory lock so a concurrent reader can
    /// never observe a partially persisted index.
    pub async fn build_or_update(&self, nodes: &[Node]) -> Result<StudyIndex> {
        std::fs::create_dir_all(&self.index_dir).with_context(|| {
            format!(
                "Failed to create index directory: {}",
                self.index_dir.display()
            )
        })?;

        let _lock = IndexLock::acquire(&self.lock_path())?;

        match self.try_load(VECTOR_INDEX_ID).await? {
            Some(mut index) => {
                info!("Found a persisted index; merging {} nodes", nodes.len());
                index.insert_nodes(nodes).await?;
                index.catalog.touch_index(VECTOR_INDEX_ID).await?;
                Ok(index)
            }
            None => {
                info!(
                    "No persisted index found; building a fresh one from {} nodes",
                    nodes.len()
                );

                let catalog = Database::new(self.catalog_path())
                    .await
                    .context("Failed to open index catalog")?;
                catalog.create_index(VECTOR_INDEX_ID).await?;

                let vectors = VectorStore::open(&self.vectors_dir(), VECTOR_INDEX_ID)
                    .await
                    .context("Failed to open vector store")?;

                let mut index = StudyIndex {
                    id: VECTOR_INDEX_ID.to_string(),
                    catalog,
                    vectors,
                };
                index.insert_nodes(nodes).await?;
                Ok(index)
            }
        }
    }
}

/// Advisory lock over the index's build/update/persist critical section.
struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    fn acquire(path: &Path) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                debug!("Acquired index lock at {}", path.display());
                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => Err(
                StudyError::Database(format!(
                    "Another index build is in progress (lock file: {})",
                    path.display()
                ))
                .into(),
            ),
            Err(error) => {
                Err(anyhow::Error::from(error).context("Failed to create index lock file"))
            }
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
