//! Error types for the Lightbox asset pipeline.
//!
//! Errors are organized by concern so a failed item can be reported with the
//! file it belongs to and the step that failed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Lightbox operations.
#[derive(Error, Debug)]
pub enum LightboxError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A collection descriptor is missing or malformed
    #[error("Invalid collection descriptor {path}: {message}")]
    DescriptorError { path: PathBuf, message: String },
}

/// Errors raised while driving a single source item through the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File read/write/hash/mkdir failure
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image transform tool failed or exited nonzero
    #[error("Transform failed for {path}: {message}")]
    Transform { path: PathBuf, message: String },

    /// The metadata tool failed or produced unusable output
    #[error("Metadata extraction failed for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Every derived asset for a source item failed
    #[error("No derived assets produced for {path} ({failed} failed, first: {first})")]
    NoDerivedAssets {
        path: PathBuf,
        failed: usize,
        first: Box<PipelineError>,
    },

    /// A queued job ended without delivering its result (it panicked)
    #[error("Job on the {queue} queue was dropped before completing")]
    JobDropped { queue: String },
}

impl PipelineError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for Lightbox results.
pub type Result<T> = std::result::Result<T, LightboxError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_path() {
        let err = PipelineError::io(
            "/photos/a.jpg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/photos/a.jpg"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_no_derived_assets_reports_first_error() {
        let err = PipelineError::NoDerivedAssets {
            path: PathBuf::from("b.jpg"),
            failed: 3,
            first: Box::new(PipelineError::Transform {
                path: PathBuf::from("b.jpg"),
                message: "convert exited with status 1".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 failed"));
        assert!(msg.contains("convert exited"));
    }
}
