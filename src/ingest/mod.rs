// Document ingestion module
// Load -> filter -> chunk -> summarize -> embed, with a content-hash cache
// in front of the expensive transforms.


pub mod cache;
pub mod chunking;
pub mod filter;
pub mod loader;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::OpenAiClient;

pub use cache::{CachedTransform, IngestionCache, content_hash};
pub use chunking::{SplitterConfig, TextChunk, estimate_token_count, split_text};
pub use filter::EXCLUDED_PHRASES;
pub use loader::{Document, load_documents};

/// The atomic retrievable unit produced by ingestion: a chunk with its
/// summary and embedding attached. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub summary: String,
    pub embedding: Vec<f32>,
    /// SHA-256 of the pre-transform chunk text; cache key.
    pub content_hash: String,
    pub token_count: usize,
}

/// The two per-chunk model capabilities the pipeline consumes. Kept behind a
/// trait so tests can count calls without a provider.
pub trait NodeEnricher {
    fn summarize(&self, text: &str) -> Result<String>;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Production enricher backed by the configured provider, summarizing in the
/// configured language.
pub struct ProviderEnricher<'a> {
    client: &'a OpenAiClient,
    language: &'a str,
}

impl<'a> ProviderEnricher<'a> {
    pub fn new(client: &'a OpenAiClient, language: &'a str) -> Self {
        Self { client, language }
    }
}

impl NodeEnricher for ProviderEnricher<'_> {
    fn summarize(&self, text: &str) -> Result<String> {
        self.client.summarize(text, self.language)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text)
    }
}

pub struct IngestionPipeline<E> {
    enricher: E,
    splitter: SplitterConfig,
    cache_file: PathBuf,
}

impl<E: NodeEnricher> IngestionPipeline<E> {
    pub fn new(enricher: E, config: &Config) -> Result<Self> {
        Ok(Self {
            enricher,
            splitter: SplitterConfig::default(),
            cache_file: config.cache_file().context("Failed to resolve cache path")?,
        })
    }

    /// Run the full pipeline over the upload directory and return the
    /// resulting nodes in document and chunk order. The cache file is
    /// re-persisted before returning.
    pub fn ingest(&self, upload_dir: &Path) -> Result<Vec<Node>> {
        let mut documents =
            load_documents(upload_dir).context("Failed to load uploaded documents")?;
        info!("Loaded {} documents from upload directory", documents.len());

        filter::apply_excluded_phrases(&mut documents);

        let mut cache = IngestionCache::load_or_empty(&self.cache_file);

        let mut planned = Vec::new();
        for document in &documents {
            for chunk in split_text(&document.text, &self.splitter) {
                planned.push((document.id.clone(), chunk));
            }
        }
        info!("Split documents into {} chunks", planned.len());

        let progress = ProgressBar::new(planned.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .context("Invalid progress bar template")?,
        );

        let mut nodes = Vec::with_capacity(planned.len());
        let mut cache_hits = 0usize;

        for (document_id, chunk) in planned {
            progress.set_message(document_id.clone());

            let hash = content_hash(&chunk.text);
            let transform = match cache.get(&hash) {
                Some(cached) => {
                    debug!("Cache hit for chunk {} of {}", chunk.chunk_index, document_id);
                    cache_hits += 1;
                    cached.clone()
                }
                None => {
                    let summary = self
                        .enricher
                        .summarize(&chunk.text)
                        .with_context(|| format!("Failed to summarize a chunk of {document_id}"))?;
                    let embedding = self
                        .enricher
                        .embed(&chunk.text)
                        .with_context(|| format!("Failed to embed a chunk of {document_id}"))?;

                    let transform = CachedTransform { summary, embedding };
                    cache.insert(hash.clone(), transform.clone());
                    transform
                }
            };

            nodes.push(Node {
                id: Uuid::new_v4().to_string(),
                document_id,
                chunk_index: chunk.chunk_index,
                text: chunk.text,
                summary: transform.summary,
                embedding: transform.embedding,
                content_hash: hash,
                token_count: chunk.token_count,
            });
            progress.inc(1);
        }

        progress.finish_and_clear();

        cache
            .persist(&self.cache_file)
            .context("Failed to persist ingestion cache")?;

        info!(
            "Ingestion produced {} nodes ({} cache hits)",
            nodes.len(),
            cache_hits
        );

        Ok(nodes)
    }
}
