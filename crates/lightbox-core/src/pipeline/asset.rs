//! The asset pipeline: one source item from raw file to derived assets and metadata.
//!
//! Each step is an `.await` on queued work. After a step finishes the pipeline
//! reports a [`PipelineEvent`] and [`transition`] computes the next state, so the
//! recorded path always follows the forward-only state graph.

use std::path::Path;
use std::sync::Arc;

use crate::cache::CachedEntry;
use crate::collaborators::{parse_raw_metadata, ExtractedMetadata, TransformRequest};
use crate::config::CachePolicy;
use crate::error::{PipelineError, PipelineResult};
use crate::fanin::{FanInCounter, FanInSummary};
use crate::naming::join_url;
use crate::queue::BoundedWorkQueue;
use crate::types::{AssetDescriptor, ContentIdentity, DerivedAsset, DerivedAssetSpec, SourceItem};

use super::state::{transition, PipelineEvent, PipelineState};
use super::PipelineContext;

/// Placeholder written into every new output directory to suppress listings.
pub const INDEX_PLACEHOLDER: &str = "index.html";

/// Result of trying to create a derived output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDir {
    /// Newly created; derived assets must be generated
    Created,
    /// Present from an earlier run (or a sibling item with the same identity)
    AlreadyExists,
}

/// A derived asset that failed, keyed by its file name.
type AssetFailure = (String, PipelineError);

/// Drives one [`SourceItem`] through the pipeline states.
///
/// Created by [`Scheduler::pipeline`](crate::Scheduler::pipeline) and consumed by
/// [`run`](Self::run).
pub struct AssetPipeline {
    ctx: Arc<PipelineContext>,
    item: SourceItem,
    cached: CachedEntry,
    namespace: Option<String>,
    state: PipelineState,
    trace: Vec<PipelineState>,
}

impl AssetPipeline {
    pub fn new(ctx: Arc<PipelineContext>, item: SourceItem, cached: CachedEntry) -> Self {
        Self {
            ctx,
            item,
            cached,
            namespace: None,
            state: PipelineState::Idle,
            trace: vec![PipelineState::Idle],
        }
    }

    /// Namespace the derived directory name (`photo-<namespace>-<digest>`).
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn item(&self) -> &SourceItem {
        &self.item
    }

    /// Run to `Complete` or `Failed`.
    pub async fn run(self) -> PipelineResult<AssetDescriptor> {
        self.run_traced().await.0
    }

    /// Run to `Complete` or `Failed`, also returning every state visited.
    pub async fn run_traced(mut self) -> (PipelineResult<AssetDescriptor>, Vec<PipelineState>) {
        self.advance(PipelineEvent::Start);
        let result = self.drive().await;
        if let Err(e) = &result {
            tracing::debug!("{} failed: {}", self.item.source_name(), e);
            self.advance(PipelineEvent::StepFailed);
        }
        (result, self.trace)
    }

    async fn drive(&mut self) -> PipelineResult<AssetDescriptor> {
        let ctx = Arc::clone(&self.ctx);
        let settings = &ctx.settings;

        // ComputingIdentity
        let identity = self.compute_identity().await?;
        self.advance(PipelineEvent::IdentityReady);

        // EnsuringOutputDir
        let name = identity.derived_name(self.namespace.as_deref());
        let dir = settings.output_root.join(&name);
        let (pending, deduplicated) = match ensure_output_dir(&ctx.fs_queue, &dir).await? {
            OutputDir::Created => {
                self.advance(PipelineEvent::OutputDirCreated);
                (settings.derived.clone(), false)
            }
            OutputDir::AlreadyExists => {
                let missing = if settings.verify_derived_assets {
                    missing_assets(&ctx.fs_queue, &dir, &settings.derived).await?
                } else {
                    Vec::new()
                };
                tracing::debug!(
                    "{} already exists, {} derived files missing",
                    name,
                    missing.len()
                );
                self.advance(PipelineEvent::OutputDirExists {
                    missing: missing.len(),
                });
                (missing, true)
            }
        };

        // GeneratingDerivedAssets
        let mut failed_files = Vec::new();
        if !pending.is_empty() {
            // Files already verified on disk count towards success.
            let present = settings.derived.len() - pending.len();
            let summary = self.generate(&dir, &pending).await?;
            let succeeded = present + summary.succeeded();
            let failed = summary.failures();
            self.advance(PipelineEvent::DerivedAssetsDone { succeeded, failed });

            if succeeded == 0 {
                if let Some((_, first)) = summary.into_first_error() {
                    return Err(PipelineError::NoDerivedAssets {
                        path: self.item.file_path.clone(),
                        failed,
                        first: Box::new(first),
                    });
                }
            } else {
                for (file_name, error) in summary.errors {
                    tracing::warn!("{}: {} not generated: {}", self.item.source_name(), file_name, error);
                    failed_files.push(file_name);
                }
            }
        }

        // ExtractingMetadata
        let metadata = self.extract_metadata(&identity).await?;
        self.advance(PipelineEvent::MetadataReady);

        let assets = settings
            .derived
            .iter()
            .filter(|spec| !failed_files.contains(&spec.file_name))
            .map(|spec| DerivedAsset {
                file_name: spec.file_name.clone(),
                url: join_url(&settings.http_prefix, &[&name, &spec.file_name]),
                size_limit: spec.size_limit,
                thumbnail: spec.thumbnail,
                square: spec.square,
            })
            .collect();

        let mut tags = self.item.tags.clone();
        tags.extend(metadata.tags.iter().cloned());

        Ok(AssetDescriptor {
            source_file: self.item.source_name(),
            title: self.item.title.clone(),
            description: self.item.description.clone(),
            identity,
            name,
            assets,
            metadata: metadata.fields,
            tags,
            raw_metadata: metadata.raw_text,
            deduplicated,
        })
    }

    /// Reuse the cached hash when the policy trusts file names, else hash the source.
    async fn compute_identity(&self) -> PipelineResult<ContentIdentity> {
        if self.ctx.settings.cache_policy == CachePolicy::TrustFileName {
            if let Some(hash) = &self.cached.hash {
                tracing::debug!("{}: reusing cached hash", self.item.source_name());
                return Ok(ContentIdentity::from_digest(hash.clone()));
            }
        }
        self.ctx
            .hasher
            .hash(
                &self.item.file_path,
                &[self.item.title.as_deref(), self.item.description.as_deref()],
            )
            .await
    }

    /// Cached raw metadata usable for this identity under the cache policy.
    fn cached_raw_metadata(&self, identity: &ContentIdentity) -> Option<&str> {
        let raw = self.cached.raw_metadata.as_deref()?;
        match self.ctx.settings.cache_policy {
            CachePolicy::TrustFileName => Some(raw),
            CachePolicy::VerifyContent => {
                (self.cached.hash.as_deref() == Some(identity.digest())).then_some(raw)
            }
        }
    }

    async fn extract_metadata(&self, identity: &ContentIdentity) -> PipelineResult<ExtractedMetadata> {
        if let Some(raw) = self.cached_raw_metadata(identity) {
            tracing::debug!("{}: reusing cached metadata", self.item.source_name());
            return Ok(parse_raw_metadata(raw));
        }

        let extractor = Arc::clone(&self.ctx.extractor);
        let source = self.item.file_path.clone();
        self.ctx
            .exec_queue
            .submit(move || async move { extractor.extract(&source).await })
            .await?
    }

    /// Fan out one transform job per spec and wait for all of them.
    async fn generate(
        &self,
        dir: &Path,
        specs: &[DerivedAssetSpec],
    ) -> PipelineResult<FanInSummary<AssetFailure>> {
        let (counter, done) = FanInCounter::with_signal(specs.len());

        for spec in specs {
            let request = TransformRequest::for_spec(&self.item.file_path, dir, spec);
            let transformer = Arc::clone(&self.ctx.transformer);
            let handle = self
                .ctx
                .exec_queue
                .submit(move || async move { transformer.transform(&request).await });

            let counter = counter.clone();
            let file_name = spec.file_name.clone();
            tokio::spawn(async move {
                let outcome = handle.await.and_then(|result| result);
                counter.decrement(outcome.map_err(|e| (file_name, e)));
            });
        }
        drop(counter);

        done.await.map_err(|_| PipelineError::JobDropped {
            queue: self.ctx.exec_queue.name().to_string(),
        })
    }

    fn advance(&mut self, event: PipelineEvent) {
        let next = transition(self.state, event);
        if next != self.state {
            tracing::debug!("{}: {} -> {}", self.item.source_name(), self.state, next);
            self.state = next;
            self.trace.push(next);
        }
    }
}

/// Create a derived output directory through the file-system queue.
///
/// A new directory gets the [`INDEX_PLACEHOLDER`] file. An existing directory
/// is reported as [`OutputDir::AlreadyExists`], never as an error.
pub async fn ensure_output_dir(fs_queue: &BoundedWorkQueue, dir: &Path) -> PipelineResult<OutputDir> {
    let dir = dir.to_path_buf();
    fs_queue
        .submit(move || async move {
            if let Some(parent) = dir.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| PipelineError::io(parent, e))?;
            }
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    return Ok(OutputDir::AlreadyExists);
                }
                Err(e) => return Err(PipelineError::io(&dir, e)),
            }

            let index = dir.join(INDEX_PLACEHOLDER);
            tokio::fs::write(&index, " ")
                .await
                .map_err(|e| PipelineError::io(&index, e))?;
            Ok::<_, PipelineError>(OutputDir::Created)
        })
        .await?
}

/// Specs whose output file is absent from an existing directory.
async fn missing_assets(
    fs_queue: &BoundedWorkQueue,
    dir: &Path,
    specs: &[DerivedAssetSpec],
) -> PipelineResult<Vec<DerivedAssetSpec>> {
    let dir = dir.to_path_buf();
    let specs = specs.to_vec();
    fs_queue
        .submit(move || async move {
            let mut missing = Vec::new();
            for spec in specs {
                let path = dir.join(&spec.file_name);
                let exists = tokio::fs::try_exists(&path)
                    .await
                    .map_err(|e| PipelineError::io(&path, e))?;
                if !exists {
                    missing.push(spec);
                }
            }
            Ok::<_, PipelineError>(missing)
        })
        .await?
}
