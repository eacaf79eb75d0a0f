//! Per-item asset pipeline.
//!
//! - **state**: pipeline states and the pure transition function
//! - **asset**: [`AssetPipeline`], driving one source item through those states

pub mod asset;
pub mod state;

pub use asset::{AssetPipeline, OutputDir};
pub use state::{transition, PipelineEvent, PipelineState};

use std::path::PathBuf;
use std::sync::Arc;

use crate::collaborators::{ImageTransformer, MetadataExtractor};
use crate::config::{CachePolicy, Config};
use crate::hasher::ContentHasher;
use crate::queue::BoundedWorkQueue;
use crate::types::DerivedAssetSpec;

/// Run-wide settings every pipeline reads.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root under which `photo-<digest>` directories are created
    pub output_root: PathBuf,

    /// Prefix for derived asset URLs
    pub http_prefix: String,

    /// Variants generated for every item
    pub derived: Vec<DerivedAssetSpec>,

    pub cache_policy: CachePolicy,

    /// Check individual derived files when the output directory already exists
    pub verify_derived_assets: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_root: config.output_dir(),
            http_prefix: config.general.http_prefix.clone(),
            derived: config.derived.clone(),
            cache_policy: config.cache.policy,
            verify_derived_assets: config.dedup.verify_derived_assets,
        }
    }
}

/// Everything shared by the pipelines of one run.
pub struct PipelineContext {
    /// Bounds external tool invocations
    pub exec_queue: BoundedWorkQueue,

    /// Bounds file-system work (hashing, directory creation)
    pub fs_queue: BoundedWorkQueue,

    pub hasher: ContentHasher,
    pub transformer: Arc<dyn ImageTransformer>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub settings: PipelineSettings,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("exec_queue", &self.exec_queue)
            .field("fs_queue", &self.fs_queue)
            .field("transformer", &self.transformer.name())
            .field("extractor", &self.extractor.name())
            .field("settings", &self.settings)
            .finish()
    }
}
