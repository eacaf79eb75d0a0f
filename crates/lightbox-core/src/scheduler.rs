//! Per-run owner of the work queues and collaborators.
//!
//! A [`Scheduler`] is built once per run and handed by reference to the
//! collection and site drivers. Every pipeline it creates shares its two
//! queues; two schedulers never share anything.

use std::sync::Arc;

use crate::cache::CachedEntry;
use crate::collaborators::{
    ExifToolExtractor, ImageMagickTransformer, ImageTransformer, MetadataExtractor,
    NativeExifExtractor, NativeTransformer,
};
use crate::config::{Config, ToolBackend};
use crate::hasher::ContentHasher;
use crate::pipeline::{AssetPipeline, PipelineContext, PipelineSettings};
use crate::queue::BoundedWorkQueue;
use crate::types::SourceItem;

/// Name of the queue bounding external tool invocations.
pub const EXEC_QUEUE: &str = "exec";
/// Name of the queue bounding file-system work.
pub const FS_QUEUE: &str = "fs";

#[derive(Debug, Clone)]
pub struct Scheduler {
    ctx: Arc<PipelineContext>,
}

impl Scheduler {
    /// Create a scheduler with explicit collaborators.
    pub fn new(
        config: &Config,
        transformer: Arc<dyn ImageTransformer>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Self {
        let exec_queue = BoundedWorkQueue::new(EXEC_QUEUE, config.queues.exec_limit);
        let fs_queue = BoundedWorkQueue::new(FS_QUEUE, config.queues.fs_limit);
        tracing::debug!(
            "Scheduler: exec limit {}, fs limit {}, transformer {}, extractor {}",
            exec_queue.limit(),
            fs_queue.limit(),
            transformer.name(),
            extractor.name()
        );

        Self {
            ctx: Arc::new(PipelineContext {
                hasher: ContentHasher::new(fs_queue.clone()),
                exec_queue,
                fs_queue,
                transformer,
                extractor,
                settings: PipelineSettings::from_config(config),
            }),
        }
    }

    /// Create a scheduler with the collaborators selected by `[tools]`.
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        let (transformer, extractor): (Arc<dyn ImageTransformer>, Arc<dyn MetadataExtractor>) =
            match tools.backend {
                ToolBackend::Native => (
                    Arc::new(NativeTransformer::new(tools.jpeg_quality)),
                    Arc::new(NativeExifExtractor::new()),
                ),
                ToolBackend::Imagemagick => (
                    Arc::new(ImageMagickTransformer::new(
                        tools.convert_bin.clone(),
                        tools.jpeg_quality,
                    )),
                    Arc::new(ExifToolExtractor::new(tools.exiftool_bin.clone())),
                ),
            };
        Self::new(config, transformer, extractor)
    }

    /// Create the pipeline for one source item.
    pub fn pipeline(&self, item: SourceItem, cached: CachedEntry) -> AssetPipeline {
        AssetPipeline::new(Arc::clone(&self.ctx), item, cached)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.ctx.settings
    }

    pub fn exec_queue(&self) -> &BoundedWorkQueue {
        &self.ctx.exec_queue
    }

    pub fn fs_queue(&self) -> &BoundedWorkQueue {
        &self.ctx.fs_queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_limits_follow_config() {
        let mut config = Config::default();
        config.queues.exec_limit = 3;
        config.queues.fs_limit = 1;

        let scheduler = Scheduler::from_config(&config);
        assert_eq!(scheduler.exec_queue().limit(), 3);
        assert_eq!(scheduler.fs_queue().limit(), 1);
        assert_eq!(scheduler.exec_queue().name(), EXEC_QUEUE);
    }

    #[test]
    fn test_backend_selection() {
        let mut config = Config::default();
        config.tools.backend = ToolBackend::Imagemagick;
        let scheduler = Scheduler::from_config(&config);
        assert_eq!(scheduler.ctx.transformer.name(), "imagemagick");
        assert_eq!(scheduler.ctx.extractor.name(), "exiftool");

        let scheduler = Scheduler::from_config(&Config::default());
        assert_eq!(scheduler.ctx.transformer.name(), "native");
    }

    #[test]
    fn test_schedulers_do_not_share_queues() {
        let config = Config::default();
        let a = Scheduler::from_config(&config);
        let b = Scheduler::from_config(&config);
        assert!(!Arc::ptr_eq(&a.ctx, &b.ctx));

        let a2 = a.clone();
        assert!(Arc::ptr_eq(&a.ctx, &a2.ctx));
    }

    #[test]
    fn test_new_pipeline_is_idle() {
        let scheduler = Scheduler::from_config(&Config::default());
        let pipeline = scheduler.pipeline(SourceItem::new("/in/a.jpg"), CachedEntry::default());
        assert_eq!(pipeline.state(), crate::pipeline::PipelineState::Idle);
    }
}
