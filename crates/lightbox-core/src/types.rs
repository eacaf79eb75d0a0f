//! Core data types for the Lightbox asset pipeline.
//!
//! These types describe what goes into a pipeline run (source items, derived
//! asset specs) and what comes out of it (asset descriptors).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use crate::naming::safe_name;

/// A source photo handed to a pipeline by its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    /// Full path to the source file
    pub file_path: PathBuf,

    /// Display title
    pub title: Option<String>,

    /// Display description
    pub description: Option<String>,

    /// Tags from the collection descriptor
    pub tags: BTreeSet<String>,

    /// Descriptor-relative file name; the cache key when set
    pub cache_key: Option<String>,
}

impl SourceItem {
    /// Create an item with no title, description or tags.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            title: None,
            description: None,
            tags: BTreeSet::new(),
            cache_key: None,
        }
    }

    /// Key the item by its descriptor entry (e.g. `2012/dusk.jpg`).
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// The cache key: the descriptor entry if known, else the file name.
    pub fn source_name(&self) -> String {
        if let Some(key) = &self.cache_key {
            return key.clone();
        }
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.to_string_lossy().into_owned())
    }
}

/// One derived variant to produce for every source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAssetSpec {
    /// Longest edge (or square side) in pixels
    pub size_limit: u32,

    /// Thumbnail mode: cheaper resampling, metadata kept
    #[serde(default)]
    pub thumbnail: bool,

    /// Crop to a centred square of `size_limit`
    #[serde(default)]
    pub square: bool,

    /// File name inside the derived output directory
    pub file_name: String,
}

impl DerivedAssetSpec {
    pub fn new(size_limit: u32, thumbnail: bool, square: bool, file_name: &str) -> Self {
        Self {
            size_limit,
            thumbnail,
            square,
            file_name: file_name.to_string(),
        }
    }
}

/// Deterministic content identity of a source item (hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentity(String);

impl ContentIdentity {
    /// Wrap an already-computed hex digest (e.g. one read from the cache).
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn digest(&self) -> &str {
        &self.0
    }

    /// Name of the derived output directory: `photo-<digest>`, or
    /// `photo-<namespace>-<digest>` when namespaced by collection.
    pub fn derived_name(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("photo-{}-{}", safe_name(ns), self.0),
            None => format!("photo-{}", self.0),
        }
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A derived file that exists for a completed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAsset {
    /// File name inside the derived directory
    pub file_name: String,

    /// Public URL (`<http_prefix>/<derived name>/<file name>`)
    pub url: String,

    pub size_limit: u32,
    pub thumbnail: bool,
    pub square: bool,
}

/// Terminal output of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDescriptor {
    // === Source ===
    /// Source file as listed in the descriptor (cache key)
    pub source_file: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // === Identity ===
    /// Content identity digest
    pub identity: ContentIdentity,

    /// Derived output directory name
    pub name: String,

    // === Outputs ===
    /// Derived variants; assets whose generation failed are omitted
    pub assets: Vec<DerivedAsset>,

    /// Allow-listed metadata fields
    pub metadata: BTreeMap<String, String>,

    /// Descriptor tags merged with metadata-derived tags
    pub tags: BTreeSet<String>,

    /// Raw metadata text, persisted in the cache
    #[serde(skip)]
    pub raw_metadata: String,

    /// True when the output directory existed before this run. Generation was
    /// skipped, except for files found missing when derived assets are verified.
    pub deduplicated: bool,
}

impl AssetDescriptor {
    /// URL of the derived asset with the given file name.
    pub fn url_for(&self, file_name: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.file_name == file_name)
            .map(|a| a.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_is_file_name() {
        let item = SourceItem::new("/albums/italy/001.jpg");
        assert_eq!(item.source_name(), "001.jpg");
    }

    #[test]
    fn test_cache_key_overrides_file_name() {
        let left = SourceItem::new("/albums/italy/x/a.jpg").with_cache_key("x/a.jpg");
        let right = SourceItem::new("/albums/italy/y/a.jpg").with_cache_key("y/a.jpg");
        assert_eq!(left.source_name(), "x/a.jpg");
        assert_ne!(left.source_name(), right.source_name());
    }

    #[test]
    fn test_derived_name_plain_and_namespaced() {
        let id = ContentIdentity::from_digest("abc123");
        assert_eq!(id.derived_name(None), "photo-abc123");
        assert_eq!(id.derived_name(Some("italy 2012")), "photo-italy_32_2012-abc123");
    }

    #[test]
    fn test_builder_merges_tags() {
        let item = SourceItem::new("a.jpg")
            .with_title("Dusk")
            .with_tags(["sea", "sky"])
            .with_tags(["sea"]);
        assert_eq!(item.title.as_deref(), Some("Dusk"));
        assert_eq!(item.tags.len(), 2);
    }

    #[test]
    fn test_descriptor_serialization_skips_raw_metadata() {
        let desc = AssetDescriptor {
            source_file: "a.jpg".into(),
            title: None,
            description: None,
            identity: ContentIdentity::from_digest("ff"),
            name: "photo-ff".into(),
            assets: vec![],
            metadata: BTreeMap::new(),
            tags: BTreeSet::new(),
            raw_metadata: "Make : Canon".into(),
            deduplicated: false,
        };
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"identity\":\"ff\""));
        assert!(!json.contains("Canon"));
        assert!(!json.contains("title"));
    }
}
