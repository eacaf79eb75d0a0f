//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::DerivedAssetSpec;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory that receives one subdirectory per derived name
    pub output_dir: PathBuf,

    /// Prefix prepended to every derived asset URL
    pub http_prefix: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            http_prefix: String::new(),
        }
    }
}

/// Concurrency ceilings for the two work queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Max concurrent external tool invocations (resize, metadata)
    pub exec_limit: usize,

    /// Max concurrent file-system jobs (hashing, directory creation)
    pub fs_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            exec_limit: 5,
            fs_limit: 2,
        }
    }
}

/// How the per-collection cache file is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Reuse the cached hash without hashing and the cached raw metadata by file name.
    #[default]
    TrustFileName,
    /// Always recompute the identity; reuse raw metadata only if the identity is unchanged.
    VerifyContent,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the cache file is read and written at all
    pub enabled: bool,

    /// Cache file name inside each collection directory
    pub file_name: String,

    /// Cache keying policy
    pub policy: CachePolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_name: ".album-cache.json".to_string(),
            policy: CachePolicy::default(),
        }
    }
}

/// Dedup shortcut settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DedupConfig {
    /// Check every derived file when the output directory already exists,
    /// and generate only the missing ones.
    pub verify_derived_assets: bool,
}

/// Collection descriptor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Descriptor file that marks a directory as a collection
    pub descriptor_name: String,

    /// Namespace derived names by collection name
    pub namespace_identity: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            descriptor_name: "album.json".to_string(),
            namespace_identity: false,
        }
    }
}

/// Which collaborator implementations perform transforms and metadata extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolBackend {
    /// Pure-Rust `image` + `kamadak-exif`
    #[default]
    Native,
    /// ImageMagick `convert` + `exiftool` subprocesses
    Imagemagick,
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Collaborator backend
    pub backend: ToolBackend,

    /// ImageMagick convert binary
    pub convert_bin: String,

    /// exiftool binary
    pub exiftool_bin: String,

    /// JPEG quality for resized (non-thumbnail) variants
    pub jpeg_quality: u8,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend: ToolBackend::default(),
            convert_bin: "convert".to_string(),
            exiftool_bin: "exiftool".to_string(),
            jpeg_quality: 60,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default manifest format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// The derived variants produced for every source item.
pub fn default_derived_assets() -> Vec<DerivedAssetSpec> {
    vec![
        DerivedAssetSpec::new(1024, false, false, "1024.jpg"),
        DerivedAssetSpec::new(512, false, false, "512.jpg"),
        DerivedAssetSpec::new(200, true, false, "thumbnail.jpg"),
        DerivedAssetSpec::new(80, true, true, "80s.jpg"),
    ]
}
