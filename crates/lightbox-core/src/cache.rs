//! Per-collection cache of content hashes and raw metadata.
//!
//! Hashing a large source and running the metadata tool are the two per-item
//! costs that repeat on every run. Each collection directory carries a JSON
//! cache file mapping source file names to the last computed hash and the last
//! raw metadata text:
//!
//! ```json
//! { "hash":    { "001.jpg": "9f2c…" },
//!   "rawExif": { "001.jpg": "Make : Canon\n…" } }
//! ```
//!
//! The file is read once when a collection run starts and rewritten in full
//! when every pipeline of the collection has finished. A missing or malformed
//! file is an empty cache, never an error. The record written at the end is
//! rebuilt from that run's successful items only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Persisted mapping from source file name to hash and raw metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(default)]
    pub hash: BTreeMap<String, String>,

    #[serde(default, rename = "rawExif")]
    pub raw_exif: BTreeMap<String, String>,
}

/// Cached values for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedEntry {
    pub hash: Option<String>,
    pub raw_metadata: Option<String>,
}

impl CacheRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up what is cached for a source file name.
    pub fn lookup(&self, source_name: &str) -> CachedEntry {
        CachedEntry {
            hash: self.hash.get(source_name).cloned(),
            raw_metadata: self.raw_exif.get(source_name).cloned(),
        }
    }

    /// Record a successful item.
    pub fn insert(&mut self, source_name: impl Into<String>, hash: String, raw_metadata: String) {
        let name = source_name.into();
        self.hash.insert(name.clone(), hash);
        self.raw_exif.insert(name, raw_metadata);
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty() && self.raw_exif.is_empty()
    }

    /// Number of source files with a cached hash.
    pub fn len(&self) -> usize {
        self.hash.len()
    }
}

/// Loads and persists [`CacheRecord`]s inside collection directories.
#[derive(Debug, Clone)]
pub struct CacheStore {
    file_name: String,
}

impl CacheStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Path of the cache file for a collection directory.
    pub fn path_for(&self, collection_dir: &Path) -> PathBuf {
        collection_dir.join(&self.file_name)
    }

    /// Load the cache for a collection. Missing or malformed files yield an empty record.
    pub async fn load(&self, collection_dir: &Path) -> CacheRecord {
        let path = self.path_for(collection_dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache file at {:?}", path);
                return CacheRecord::new();
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache file {:?}: {}", path, e);
                return CacheRecord::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Ignoring malformed cache file {:?}: {}", path, e);
                CacheRecord::new()
            }
        }
    }

    /// Replace the collection's cache file with `record`.
    ///
    /// Writes a sibling temp file and renames it over the old one, so readers
    /// never observe a partially written cache.
    pub async fn persist(&self, collection_dir: &Path, record: &CacheRecord) -> PipelineResult<()> {
        let path = self.path_for(collection_dir);
        let tmp = collection_dir.join(format!("{}.tmp", self.file_name));
        let json = serde_json::to_string(record)
            .map_err(|e| PipelineError::io(&path, std::io::Error::other(e)))?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| PipelineError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PipelineError::io(&path, e))?;
        tracing::debug!("Wrote cache with {} entries to {:?}", record.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FILE: &str = ".album-cache.json";

    fn sample() -> CacheRecord {
        let mut record = CacheRecord::new();
        record.insert("001.jpg", "aa11".into(), "Make : Canon\n".into());
        record.insert("002.jpg", "bb22".into(), String::new());
        record
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(FILE);
        let record = sample();

        store.persist(tmp.path(), &record).await.unwrap();
        assert_eq!(store.load(tmp.path()).await, record);
    }

    #[tokio::test]
    async fn test_roundtrip_empty() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(FILE);

        store.persist(tmp.path(), &CacheRecord::new()).await.unwrap();
        let loaded = store.load(tmp.path()).await;
        assert!(loaded.is_empty());
        assert!(tmp.path().join(FILE).exists());
    }

    #[tokio::test]
    async fn test_load_missing_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheStore::new(FILE).load(tmp.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_returns_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(FILE), "{ not json").unwrap();
        assert!(CacheStore::new(FILE).load(tmp.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_file_format_matches_documented_keys() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(FILE);
        store.persist(tmp.path(), &sample()).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(FILE)).unwrap()).unwrap();
        assert_eq!(value["hash"]["001.jpg"], "aa11");
        assert_eq!(value["rawExif"]["001.jpg"], "Make : Canon\n");
    }

    #[tokio::test]
    async fn test_partial_file_loads_missing_section_as_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(FILE), r#"{"hash": {"a.jpg": "ff"}}"#).unwrap();
        let record = CacheStore::new(FILE).load(tmp.path()).await;
        assert_eq!(record.lookup("a.jpg").hash.as_deref(), Some("ff"));
        assert_eq!(record.lookup("a.jpg").raw_metadata, None);
    }

    #[tokio::test]
    async fn test_persist_replaces_previous_record() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(FILE);
        store.persist(tmp.path(), &sample()).await.unwrap();

        let mut next = CacheRecord::new();
        next.insert("003.jpg", "cc33".into(), String::new());
        store.persist(tmp.path(), &next).await.unwrap();

        let loaded = store.load(tmp.path()).await;
        assert_eq!(loaded, next);
        assert!(!tmp.path().join(format!("{FILE}.tmp")).exists());
    }

    #[tokio::test]
    async fn test_persist_into_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let err = CacheStore::new(FILE)
            .persist(&tmp.path().join("gone"), &sample())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
