//! Site driver: every collection under an input directory.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use walkdir::WalkDir;

use crate::collection::{Collection, CollectionReport, CollectionRunner};
use crate::config::Config;
use crate::error::LightboxError;
use crate::fanin::FanInCounter;
use crate::scheduler::Scheduler;

/// Called with a collection's label each time one finishes.
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Find the immediate subdirectories of `input` that contain a descriptor.
///
/// Fails only if `input` itself cannot be read. Results are sorted by path.
pub fn discover_collections(input: &Path, descriptor_name: &str) -> Result<Vec<PathBuf>, LightboxError> {
    std::fs::read_dir(input)?;

    let mut dirs: Vec<PathBuf> = WalkDir::new(input)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .filter(|dir| dir.join(descriptor_name).is_file())
        .collect();

    dirs.sort();
    tracing::debug!("Discovered {} collections under {:?}", dirs.len(), input);
    Ok(dirs)
}

/// A collection whose descriptor could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFailure {
    pub dir: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteTotals {
    pub collections: usize,
    pub failed_collections: usize,
    pub items: usize,
    pub failed_items: usize,
}

/// Result of a whole-site run.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    /// Highest sort code first, ties by name
    pub collections: Vec<CollectionReport>,
    pub failed_collections: Vec<CollectionFailure>,
    pub totals: SiteTotals,
}

/// Runs many collections concurrently on one [`Scheduler`].
#[derive(Clone)]
pub struct SiteRunner {
    runner: CollectionRunner,
    descriptor_name: String,
    progress: Option<ProgressCallback>,
}

impl SiteRunner {
    pub fn new(scheduler: Scheduler, config: &Config) -> Self {
        Self {
            runner: CollectionRunner::new(scheduler, config),
            descriptor_name: config.collection.descriptor_name.clone(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn descriptor_name(&self) -> &str {
        &self.descriptor_name
    }

    /// Run every collection directory. A collection that fails to load is
    /// recorded and the others still run.
    pub async fn run(&self, dirs: Vec<PathBuf>) -> SiteReport {
        let total = dirs.len();
        let slots: Arc<Mutex<Vec<Option<CollectionReport>>>> = Arc::new(Mutex::new(vec![None; total]));
        let (counter, done) = FanInCounter::<CollectionFailure>::with_signal(total);

        for (index, dir) in dirs.into_iter().enumerate() {
            let runner = self.runner.clone();
            let descriptor_name = self.descriptor_name.clone();
            let progress = self.progress.clone();
            let counter = counter.clone();
            let slots = Arc::clone(&slots);

            tokio::spawn(async move {
                let outcome = match Collection::load(&dir, &descriptor_name).await {
                    Ok(collection) => {
                        let report = runner.run(&collection).await;
                        slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(report);
                        if let Some(progress) = &progress {
                            progress(collection.name.as_str());
                        }
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!("Skipping collection {:?}: {}", dir, e);
                        if let Some(progress) = &progress {
                            progress(dir.to_string_lossy().as_ref());
                        }
                        Err(CollectionFailure {
                            dir,
                            error: e.to_string(),
                        })
                    }
                };
                counter.decrement(outcome);
            });
        }
        drop(counter);

        let mut failed_collections = match done.await {
            Ok(summary) => summary.errors,
            Err(_) => {
                tracing::error!("A collection task aborted");
                Vec::new()
            }
        };
        failed_collections.sort_by(|a, b| a.dir.cmp(&b.dir));

        let results = std::mem::take(&mut *slots.lock().unwrap_or_else(PoisonError::into_inner));
        let mut collections: Vec<CollectionReport> = results.into_iter().flatten().collect();
        sort_collections(&mut collections);

        let totals = SiteTotals {
            collections: collections.len(),
            failed_collections: failed_collections.len(),
            items: collections.iter().map(|c| c.succeeded()).sum(),
            failed_items: collections.iter().map(|c| c.failed()).sum(),
        };
        tracing::info!(
            "Site: {} collections ({} failed), {} items ({} failed)",
            totals.collections,
            totals.failed_collections,
            totals.items,
            totals.failed_items
        );

        SiteReport {
            collections,
            failed_collections,
            totals,
        }
    }
}

/// Highest sort code first, then by name.
pub fn sort_collections(collections: &mut [CollectionReport]) {
    collections.sort_by(|a, b| b.sortcode.cmp(&a.sortcode).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(name: &str, sortcode: i64) -> CollectionReport {
        CollectionReport {
            name: name.to_string(),
            title: name.to_string(),
            description: None,
            sortcode,
            cover: None,
            items: vec![],
            failures: vec![],
        }
    }

    #[test]
    fn test_discover_only_dirs_with_descriptor() {
        let tmp = TempDir::new().unwrap();
        for name in ["b-album", "a-album", "no-descriptor"] {
            std::fs::create_dir(tmp.path().join(name)).unwrap();
        }
        std::fs::write(tmp.path().join("a-album/album.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("b-album/album.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("album.json"), "{}").unwrap();

        let dirs = discover_collections(tmp.path(), "album.json").unwrap();
        assert_eq!(
            dirs,
            vec![tmp.path().join("a-album"), tmp.path().join("b-album")]
        );
    }

    #[test]
    fn test_discover_is_not_recursive() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("outer/inner")).unwrap();
        std::fs::write(tmp.path().join("outer/inner/album.json"), "{}").unwrap();

        assert!(discover_collections(tmp.path(), "album.json").unwrap().is_empty());
    }

    #[test]
    fn test_discover_missing_input_fails() {
        let err = discover_collections(Path::new("/nonexistent/input"), "album.json").unwrap_err();
        assert!(matches!(err, LightboxError::Io(_)));
    }

    #[test]
    fn test_sort_by_sortcode_then_name() {
        let mut collections = vec![report("b", 1), report("c", 5), report("a", 1), report("d", -1)];
        sort_collections(&mut collections);
        let names: Vec<&str> = collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b", "d"]);
    }

    #[tokio::test]
    async fn test_run_with_no_collections() {
        let config = Config::default();
        let runner = SiteRunner::new(Scheduler::from_config(&config), &config);
        let report = runner.run(vec![]).await;
        assert!(report.collections.is_empty());
        assert_eq!(report.totals, SiteTotals::default());
    }
}
