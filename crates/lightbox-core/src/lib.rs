//! Lightbox Core - asset pipeline for static photo albums.
//!
//! Lightbox turns a directory of collections (each a folder of photos plus an
//! `album.json` descriptor) into resized variants, extracted metadata and a
//! manifest, skipping work that earlier runs already did.
//!
//! # Architecture
//!
//! ```text
//! SiteRunner ─┬─ CollectionRunner ─┬─ AssetPipeline ─┬─ transform job ─┐
//!             │   (cache load)     │                 ├─ transform job ─┼─ fan-in → metadata → descriptor
//!             │                    │                 └─ transform job ─┘
//!             │                    └─ AssetPipeline …
//!             │   fan-in → cache persist → CollectionReport
//!             └─ CollectionRunner …
//! fan-in → SiteReport
//! ```
//!
//! Every level waits on a [`FanInCounter`]. All pipelines of a run share the two
//! [`BoundedWorkQueue`]s owned by the [`Scheduler`]: one bounding external tool
//! invocations, one bounding file-system work.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lightbox_core::{discover_collections, Config, Scheduler, SiteRunner};
//!
//! #[tokio::main]
//! async fn main() -> lightbox_core::Result<()> {
//!     let config = Config::load()?;
//!     let dirs = discover_collections("./albums".as_ref(), &config.collection.descriptor_name)?;
//!     let report = SiteRunner::new(Scheduler::from_config(&config), &config).run(dirs).await;
//!     println!("{} items", report.totals.items);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collaborators;
pub mod collection;
pub mod config;
pub mod error;
pub mod fanin;
pub mod hasher;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod site;
pub mod types;

pub use cache::{CacheRecord, CacheStore, CachedEntry};
pub use collection::{Collection, CollectionDescriptor, CollectionReport, CollectionRunner, ItemFailure};
pub use config::Config;
pub use error::{ConfigError, LightboxError, PipelineError, PipelineResult, Result};
pub use fanin::{FanInCounter, FanInSummary};
pub use hasher::ContentHasher;
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{AssetPipeline, OutputDir, PipelineState};
pub use queue::{BoundedWorkQueue, JobHandle, QueueStats};
pub use scheduler::Scheduler;
pub use site::{discover_collections, SiteReport, SiteRunner};
pub use types::{AssetDescriptor, ContentIdentity, DerivedAsset, DerivedAssetSpec, SourceItem};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
