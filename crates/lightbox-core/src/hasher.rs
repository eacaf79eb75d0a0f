//! Content identity hashing.
//!
//! The identity of a source item is a BLAKE3 digest over its extra fields
//! (title, description) followed by the file's byte stream. Hashing runs as a
//! job on the file-system queue so that only a bounded number of files are
//! open at once.

use blake3::Hasher as Blake3Hasher;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::queue::BoundedWorkQueue;
use crate::types::ContentIdentity;

/// Marks an extra field that is absent, so `(Some(x), None)` and `(None, Some(x))` differ.
const ABSENT_FIELD: u8 = 0x00;
const PRESENT_FIELD: u8 = 0x01;

/// Computes content identities through a bounded queue.
#[derive(Clone, Debug)]
pub struct ContentHasher {
    queue: BoundedWorkQueue,
}

impl ContentHasher {
    pub fn new(queue: BoundedWorkQueue) -> Self {
        Self { queue }
    }

    /// Hash a file together with its extra fields.
    ///
    /// Not retried: an unreadable file fails with [`PipelineError::Io`].
    pub async fn hash(
        &self,
        path: &Path,
        extra_fields: &[Option<&str>],
    ) -> PipelineResult<ContentIdentity> {
        let path: PathBuf = path.to_path_buf();
        let fields: Vec<Option<String>> = extra_fields
            .iter()
            .map(|f| f.map(str::to_string))
            .collect();

        self.queue
            .submit(move || async move {
                let job_path = path.clone();
                tokio::task::spawn_blocking(move || {
                    let fields: Vec<Option<&str>> = fields.iter().map(|f| f.as_deref()).collect();
                    hash_file(&job_path, &fields)
                })
                .await
                .map_err(|e| {
                    PipelineError::io(&path, std::io::Error::other(format!("hash task: {e}")))
                })?
            })
            .await?
    }
}

/// Synchronously hash extra fields followed by the file contents.
///
/// Streams the file so large sources are never held in memory.
pub fn hash_file(path: &Path, extra_fields: &[Option<&str>]) -> PipelineResult<ContentIdentity> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Blake3Hasher::new();
    fold_fields(&mut hasher, extra_fields);

    // 64KB read buffer
    let mut buffer = [0u8; 65536];
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| PipelineError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentIdentity::from_digest(
        hasher.finalize().to_hex().to_string(),
    ))
}

/// Hash extra fields followed by an in-memory byte buffer.
pub fn hash_bytes(data: &[u8], extra_fields: &[Option<&str>]) -> ContentIdentity {
    let mut hasher = Blake3Hasher::new();
    fold_fields(&mut hasher, extra_fields);
    hasher.update(data);
    ContentIdentity::from_digest(hasher.finalize().to_hex().to_string())
}

fn fold_fields(hasher: &mut Blake3Hasher, fields: &[Option<&str>]) {
    for field in fields {
        match field {
            Some(value) => {
                hasher.update(&[PRESENT_FIELD]);
                hasher.update(&(value.len() as u64).to_le_bytes());
                hasher.update(value.as_bytes());
            }
            None => {
                hasher.update(&[ABSENT_FIELD]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_hash_file_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.jpg", b"pixels");
        let h1 = hash_file(&path, &[Some("Dusk"), None]).unwrap();
        let h2 = hash_file(&path, &[Some("Dusk"), None]).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.digest().len(), 64);
    }

    #[test]
    fn test_identical_inputs_in_different_files_match() {
        let tmp = TempDir::new().unwrap();
        let a = write(&tmp, "a.jpg", b"same bytes");
        let b = write(&tmp, "b.jpg", b"same bytes");
        assert_eq!(
            hash_file(&a, &[Some("t"), Some("d")]).unwrap(),
            hash_file(&b, &[Some("t"), Some("d")]).unwrap()
        );
    }

    #[test]
    fn test_title_or_description_change_changes_identity() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.jpg", b"pixels");
        let base = hash_file(&path, &[Some("Dusk"), Some("Harbour")]).unwrap();
        assert_ne!(base, hash_file(&path, &[Some("Dawn"), Some("Harbour")]).unwrap());
        assert_ne!(base, hash_file(&path, &[Some("Dusk"), Some("Bay")]).unwrap());
        assert_ne!(base, hash_file(&path, &[Some("Dusk"), None]).unwrap());
    }

    #[test]
    fn test_field_position_matters() {
        let h1 = hash_bytes(b"x", &[Some("a"), None]);
        let h2 = hash_bytes(b"x", &[None, Some("a")]);
        let h3 = hash_bytes(b"x", &[Some("ab"), Some("")]);
        let h4 = hash_bytes(b"x", &[Some("a"), Some("b")]);
        assert_ne!(h1, h2);
        assert_ne!(h3, h4);
    }

    #[test]
    fn test_stream_matches_in_memory() {
        let tmp = TempDir::new().unwrap();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let path = write(&tmp, "big.jpg", &data);
        assert_eq!(
            hash_file(&path, &[Some("t")]).unwrap(),
            hash_bytes(&data, &[Some("t")])
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = hash_file(Path::new("/nonexistent/file.jpg"), &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[tokio::test]
    async fn test_hash_through_queue() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.jpg", b"pixels");
        let queue = BoundedWorkQueue::new("fs", 2);
        let hasher = ContentHasher::new(queue.clone());

        let id = hasher.hash(&path, &[Some("Dusk"), None]).await.unwrap();
        assert_eq!(id, hash_file(&path, &[Some("Dusk"), None]).unwrap());
        assert_eq!(queue.stats().completed, 1);

        let err = hasher
            .hash(&tmp.path().join("missing.jpg"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
