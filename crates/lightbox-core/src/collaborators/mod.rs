//! External collaborators: pixel transforms and metadata extraction.
//!
//! The pipeline only sees the [`ImageTransformer`] and [`MetadataExtractor`]
//! traits. Two backends implement them:
//! - **imagemagick**: `convert` and `exiftool` subprocesses
//! - **native**: the `image` and `kamadak-exif` crates on blocking threads
//!
//! Both extractors produce exiftool-style raw text (`Key : value` lines). The
//! raw text is what the cache persists, and [`parse_raw_metadata`] turns it
//! into fields and tags whether it came from a tool or from the cache.

mod imagemagick;
mod native;

pub use imagemagick::{convert_args, ExifToolExtractor, ImageMagickTransformer};
pub use native::{NativeExifExtractor, NativeTransformer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PipelineResult;
use crate::types::DerivedAssetSpec;

/// Metadata keys kept from the raw text.
pub const ALLOWED_METADATA_KEYS: &[&str] = &[
    "File Type",
    "Make",
    "Camera Model Name",
    "Software",
    "Artist",
    "Exposure Time",
    "F Number",
    "Exposure Program",
    "ISO",
    "Date/Time Original",
    "Create Date",
    "Light Source",
    "Focal Length",
    "Focus Mode",
    "White Balance",
    "Lens",
    "Lens ID",
];

/// One pixel transform: source file to a resized variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub size_limit: u32,
    pub thumbnail: bool,
    pub square: bool,
}

impl TransformRequest {
    /// Build the request for one derived asset spec.
    pub fn for_spec(source: &Path, output_dir: &Path, spec: &DerivedAssetSpec) -> Self {
        Self {
            source: source.to_path_buf(),
            dest: output_dir.join(&spec.file_name),
            size_limit: spec.size_limit,
            thumbnail: spec.thumbnail,
            square: spec.square,
        }
    }

    /// Whether the destination should be written as JPEG.
    pub fn is_jpeg(&self) -> bool {
        self.dest
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false)
    }
}

/// Parsed metadata for one source item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Allow-listed fields
    pub fields: BTreeMap<String, String>,
    /// Tags derived from camera and lens fields
    pub tags: Vec<String>,
    /// The unparsed tool output, persisted in the cache
    pub raw_text: String,
}

/// Produces one derived image.
#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(&self, request: &TransformRequest) -> PipelineResult<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Reads metadata from a source image.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, source: &Path) -> PipelineResult<ExtractedMetadata>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Parse exiftool-style raw text into allow-listed fields and tags.
///
/// Lines that are not `Key : value`, or whose key is not allow-listed, are
/// skipped. Tags are the make, the camera model and the lens (`Lens ID`,
/// else `Lens`).
pub fn parse_raw_metadata(raw: &str) -> ExtractedMetadata {
    let mut fields = BTreeMap::new();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() || !ALLOWED_METADATA_KEYS.contains(&key) {
            continue;
        }
        fields.insert(key.to_string(), value.to_string());
    }

    let mut tags: Vec<String> = Vec::new();
    let lens = fields.get("Lens ID").or_else(|| fields.get("Lens"));
    for value in [fields.get("Make"), fields.get("Camera Model Name"), lens]
        .into_iter()
        .flatten()
    {
        if !tags.contains(value) {
            tags.push(value.clone());
        }
    }

    ExtractedMetadata {
        fields,
        tags,
        raw_text: raw.to_string(),
    }
}

/// Render fields in the exiftool text layout.
pub(crate) fn render_raw_line(key: &str, value: &str) -> String {
    format!("{key:<32}: {value}\n")
}
