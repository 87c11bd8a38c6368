use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::StudyError;

/// Hash of a chunk's pre-transform content, used as the cache key.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")
}

/// The expensive per-chunk results worth remembering across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTransform {
    pub summary: String,
    pub embedding: Vec<f32>,
}

/// Hash-keyed record of prior summarize/embed results. Content hashing to
/// the same key yields the cached output and skips recomputation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IngestionCache {
    entries: HashMap<String, CachedTransform>,
}

impl IngestionCache {
    /// Load the cache file. `Ok(None)` when the file does not exist yet;
    /// an error when it exists but cannot be parsed.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

        let cache: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache file: {}", path.display()))?;

        Ok(Some(cache))
    }

    /// Load the cache, applying the recovery policy: a missing file is a
    /// normal first run, a corrupt file is logged and replaced by an empty
    /// cache (the run recomputes everything; nothing is lost but time).
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(cache)) => {
                debug!("Loaded ingestion cache with {} entries", cache.len());
                cache
            }
            Ok(None) => {
                debug!("No ingestion cache found, starting cold");
                Self::default()
            }
            Err(error) => {
                let error = StudyError::CacheUnavailable(error.to_string());
                warn!("{error}; continuing with an empty cache");
                Self::default()
            }
        }
    }

    pub fn get(&self, hash: &str) -> Option<&CachedTransform> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: String, transform: CachedTransform) {
        self.entries.insert(hash, transform);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the cache file with the current entries.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string(&self).context("Failed to serialize ingestion cache")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;

        debug!("Persisted ingestion cache ({} entries)", self.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn content_hash_is_stable_and_distinct() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }

    #[test]
    fn cache_round_trip() {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let path = temp_dir.path().join("cache.json");

        let mut cache = IngestionCache::default();
        cache.insert(
            content_hash("some chunk"),
            CachedTransform {
                summary: "a summary".to_string(),
                embedding: vec![0.1, 0.2],
            },
        );
        cache.persist(&path).expect("can persist cache");

        let reloaded = IngestionCache::try_load(&path)
            .expect("can load cache")
            .expect("cache file exists");
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get(&content_hash("some chunk")),
            cache.get(&content_hash("some chunk"))
        );
    }

    #[test]
    fn missing_cache_is_empty_not_an_error() {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let path = temp_dir.path().join("missing.json");

        assert!(IngestionCache::try_load(&path)
            .expect("missing file is not an error")
            .is_none());
        assert!(IngestionCache::load_or_empty(&path).is_empty());
    }

    #[test]
    fn corrupt_cache_falls_back_to_empty() {
        let temp_dir = TempDir::new().expect("can create temp dir");
        let path = temp_dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").expect("can write file");

        assert!(IngestionCache::try_load(&path).is_err());
        assert!(IngestionCache::load_or_empty(&path).is_empty());
    }
}
