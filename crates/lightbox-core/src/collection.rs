//! Collection driver: one directory, one descriptor, one pipeline per photo.
//!
//! A collection directory holds the source photos, an `album.json` descriptor
//! and the cache file. [`CollectionRunner::run`] loads the cache, starts every
//! pipeline at once (the scheduler's queues bound the actual work), waits for
//! all of them through a [`FanInCounter`], then rewrites the cache from the
//! items that succeeded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::{CacheRecord, CacheStore};
use crate::config::Config;
use crate::error::ConfigError;
use crate::fanin::FanInCounter;
use crate::scheduler::Scheduler;
use crate::types::{AssetDescriptor, SourceItem};

/// Sort code of a collection whose descriptor has none.
pub const DEFAULT_SORTCODE: i64 = -1;

/// One photo entry of `album.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoEntry {
    /// File name relative to the collection directory
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// Contents of a collection's `album.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Unique collection name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    /// Index into `photos` of the cover photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortcode: Option<i64>,

    /// Tags added to every photo of the collection
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub photos: Vec<PhotoEntry>,
}

impl CollectionDescriptor {
    /// Parse descriptor JSON; `path` is only used in errors.
    pub fn from_json(path: &Path, json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::DescriptorError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read `<dir>/<descriptor_name>`.
    pub async fn load(dir: &Path, descriptor_name: &str) -> Result<Self, ConfigError> {
        let path = dir.join(descriptor_name);
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::DescriptorError {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Self::from_json(&path, &json)
    }
}

/// A collection ready to run: descriptor defaults applied, items resolved.
#[derive(Debug, Clone)]
pub struct Collection {
    pub dir: PathBuf,
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub cover: usize,
    pub sortcode: i64,
    pub items: Vec<SourceItem>,
}

impl Collection {
    /// Apply descriptor defaults.
    ///
    /// The title falls back to the directory name, each photo's title to its
    /// file name, and collection tags are added to every photo's tags.
    pub fn from_descriptor(dir: &Path, descriptor: CollectionDescriptor) -> Self {
        let collection_tags = descriptor.tags;
        let items = descriptor
            .photos
            .into_iter()
            .map(|photo| {
                let title = photo.title.unwrap_or_else(|| photo.file.clone());
                let mut item = SourceItem::new(dir.join(&photo.file))
                    .with_cache_key(photo.file.clone())
                    .with_title(title)
                    .with_tags(photo.tags)
                    .with_tags(collection_tags.iter().cloned());
                item.description = photo.desc;
                item
            })
            .collect();

        Self {
            dir: dir.to_path_buf(),
            name: descriptor.name,
            title: descriptor.title.unwrap_or_else(|| dir_label(dir)),
            description: descriptor.desc,
            cover: descriptor.cover.unwrap_or(0),
            sortcode: descriptor.sortcode.unwrap_or(DEFAULT_SORTCODE),
            items,
        }
    }

    pub async fn load(dir: &Path, descriptor_name: &str) -> Result<Self, ConfigError> {
        let descriptor = CollectionDescriptor::load(dir, descriptor_name).await?;
        Ok(Self::from_descriptor(dir, descriptor))
    }
}

fn dir_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

/// A photo that did not make it through its pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub file: String,
    pub error: String,
}

/// Result of running one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub name: String,
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub sortcode: i64,

    /// Derived name of the cover photo, if it succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,

    /// Successful items in descriptor order
    pub items: Vec<AssetDescriptor>,

    /// Failed items in descriptor order
    pub failures: Vec<ItemFailure>,
}

impl CollectionReport {
    pub fn succeeded(&self) -> usize {
        self.items.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs collections on a shared [`Scheduler`].
#[derive(Debug, Clone)]
pub struct CollectionRunner {
    scheduler: Scheduler,
    cache: Option<CacheStore>,
    namespace_identity: bool,
}

impl CollectionRunner {
    pub fn new(scheduler: Scheduler, config: &Config) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| CacheStore::new(config.cache.file_name.clone()));
        Self {
            scheduler,
            cache,
            namespace_identity: config.collection.namespace_identity,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run every item of a collection and persist the rebuilt cache.
    ///
    /// Item failures are reported, never propagated.
    pub async fn run(&self, collection: &Collection) -> CollectionReport {
        let cache = match &self.cache {
            Some(store) => store.load(&collection.dir).await,
            None => CacheRecord::new(),
        };

        let total = collection.items.len();
        tracing::info!("Collection {}: {} items", collection.name, total);

        let slots: Arc<Mutex<Vec<Option<AssetDescriptor>>>> = Arc::new(Mutex::new(vec![None; total]));
        let (counter, done) = FanInCounter::<(usize, ItemFailure)>::with_signal(total);

        for (index, item) in collection.items.iter().enumerate() {
            let file = item.source_name();
            let mut pipeline = self.scheduler.pipeline(item.clone(), cache.lookup(&file));
            if self.namespace_identity {
                pipeline = pipeline.with_namespace(collection.name.as_str());
            }

            let counter = counter.clone();
            let slots = Arc::clone(&slots);
            let collection_name = collection.name.clone();
            tokio::spawn(async move {
                match pipeline.run().await {
                    Ok(descriptor) => {
                        slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(descriptor);
                        counter.decrement(Ok(()));
                    }
                    Err(e) => {
                        tracing::warn!("Collection {}: {} failed: {}", collection_name, file, e);
                        counter.decrement(Err((
                            index,
                            ItemFailure {
                                file,
                                error: e.to_string(),
                            },
                        )));
                    }
                }
            });
        }
        drop(counter);

        let mut failures = match done.await {
            Ok(summary) => summary.errors,
            Err(_) => {
                tracing::error!("Collection {}: a pipeline task aborted", collection.name);
                Vec::new()
            }
        };

        let results = std::mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner));
        for (index, slot) in results.iter().enumerate() {
            if slot.is_none() && !failures.iter().any(|(i, _)| *i == index) {
                failures.push((
                    index,
                    ItemFailure {
                        file: collection.items[index].source_name(),
                        error: "pipeline task aborted".to_string(),
                    },
                ));
            }
        }
        failures.sort_by_key(|(index, _)| *index);

        let cover = results
            .get(collection.cover)
            .and_then(|slot| slot.as_ref())
            .map(|d| d.name.clone());
        let items: Vec<AssetDescriptor> = results.into_iter().flatten().collect();

        if let Some(store) = &self.cache {
            let mut record = CacheRecord::new();
            for item in &items {
                record.insert(
                    item.source_file.clone(),
                    item.identity.digest().to_string(),
                    item.raw_metadata.clone(),
                );
            }
            if let Err(e) = store.persist(&collection.dir, &record).await {
                tracing::warn!("Collection {}: cache not written: {}", collection.name, e);
            }
        }

        tracing::info!(
            "Collection {}: {} succeeded, {} failed",
            collection.name,
            items.len(),
            failures.len()
        );

        CollectionReport {
            name: collection.name.clone(),
            title: collection.title.clone(),
            description: collection.description.clone(),
            sortcode: collection.sortcode,
            cover,
            items,
            failures: failures.into_iter().map(|(_, f)| f).collect(),
        }
    }
}
