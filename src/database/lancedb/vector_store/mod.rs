#[cfg(test)]
mod tests;

use super::{NodeEmbedding, NodePayload};
use crate::StudyError;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Vector store over node embeddings. One table per index id; the table
/// existing is what makes an index loadable.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// A node returned from similarity search.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node_id: String,
    pub payload: NodePayload,
    pub distance: f32,
    pub similarity: f32,
}

impl VectorStore {
    /// Connect to the vector database for one index id. Does not create the
    /// index table; that happens on first insert.
    pub async fn open(dir: &Path, index_id: &str) -> Result<Self, StudyError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            StudyError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", dir.display());
        debug!("Connecting to vector database at {uri}");

        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            StudyError::Database(format!("Failed to connect to vector database: {}", e))
        })?;

        let mut store = Self {
            connection,
            table_name: index_id.to_string(),
            vector_dimension: None,
        };

        if store.table_exists().await? {
            store.vector_dimension = Some(store.detect_vector_dimension().await?);
        }

        Ok(store)
    }

    /// Whether the index table has been created yet.
    pub async fn table_exists(&self) -> Result<bool, StudyError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Insert a batch of node embeddings, creating the table on first use.
    /// Existing rows are never touched.
    pub async fn insert_batch(&mut self, records: &[NodeEmbedding]) -> Result<(), StudyError> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        let vector_dim = records[0].vector.len();
        if records.iter().any(|r| r.vector.len() != vector_dim) {
            return Err(StudyError::Database(
                "Embedding batch contains mixed vector dimensions".to_string(),
            ));
        }

        match self.vector_dimension {
            None => {
                info!(
                    "Creating vector table \"{}\" with {} dimensions",
                    self.table_name, vector_dim
                );
                let schema = self.create_schema(vector_dim);
                self.connection
                    .create_empty_table(&self.table_name, schema)
                    .execute()
                    .await
                    .map_err(|e| {
                        StudyError::Database(format!("Failed to create vector table: {}", e))
                    })?;
                self.vector_dimension = Some(vector_dim);
            }
            Some(existing) if existing != vector_dim => {
                return Err(StudyError::Database(format!(
                    "Embedding dimension {} does not match the existing table ({})",
                    vector_dim, existing
                )));
            }
            Some(_) => {}
        }

        let record_batch = self.create_record_batch(records)?;

        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings", records.len());
        Ok(())
    }

    /// Nearest-neighbor search over the stored embeddings.
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredNode>, StudyError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self.open_table().await?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| StudyError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let mut results = query
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to execute search: {}", e)))?;

        let mut scored = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to read result stream: {}", e)))?
        {
            scored.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Search returned {} results", scored.len());
        Ok(scored)
    }

    pub async fn count(&self) -> Result<u64, StudyError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| StudyError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    async fn open_table(&self) -> Result<lancedb::Table, StudyError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to open vector table: {}", e)))
    }

    async fn detect_vector_dimension(&self) -> Result<usize, StudyError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(StudyError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(&self, vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("summary", DataType::Utf8, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(&self, records: &[NodeEmbedding]) -> Result<RecordBatch, StudyError> {
        let len = records.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| StudyError::Database("Vector dimension not set".to_string()))?;

        let mut ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut content_hashes = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut summaries = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            ids.push(record.id.as_str());
            document_ids.push(record.payload.document_id.as_str());
            chunk_indices.push(record.payload.chunk_index);
            content_hashes.push(record.payload.content_hash.as_str());
            texts.push(record.payload.text.as_str());
            summaries.push(record.payload.summary.as_str());
            token_counts.push(record.payload.token_count);
            created_ats.push(record.payload.created_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    StudyError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let schema = self.create_schema(vector_dim);
        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(content_hashes)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(summaries)),
            Arc::new(UInt32Array::from(token_counts)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| StudyError::Database(format!("Failed to create record batch: {}", e)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredNode>, StudyError> {
        fn string_column<'a>(
            batch: &'a RecordBatch,
            name: &str,
        ) -> Result<&'a StringArray, StudyError> {
            batch
                .column_by_name(name)
                .ok_or_else(|| StudyError::Database(format!("Missing {name} column")))?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| StudyError::Database(format!("Invalid {name} column type")))
        }

        fn u32_column<'a>(
            batch: &'a RecordBatch,
            name: &str,
        ) -> Result<&'a UInt32Array, StudyError> {
            batch
                .column_by_name(name)
                .ok_or_else(|| StudyError::Database(format!("Missing {name} column")))?
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| StudyError::Database(format!("Invalid {name} column type")))
        }

        let ids = string_column(batch, "id")?;
        let document_ids = string_column(batch, "document_id")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let content_hashes = string_column(batch, "content_hash")?;
        let texts = string_column(batch, "text")?;
        let summaries = string_column(batch, "summary")?;
        let token_counts = u32_column(batch, "token_count")?;
        let created_ats = string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut scored = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            scored.push(ScoredNode {
                node_id: ids.value(row).to_string(),
                payload: NodePayload {
                    document_id: document_ids.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    content_hash: content_hashes.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    summary: summaries.value(row).to_string(),
                    token_count: token_counts.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
                distance,
                similarity: 1.0 - distance,
            });
        }

        Ok(scored)
    }
}
