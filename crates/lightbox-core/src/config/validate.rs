//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.exec_limit == 0 {
            return Err(ConfigError::ValidationError(
                "queues.exec_limit must be > 0".into(),
            ));
        }
        if self.queues.fs_limit == 0 {
            return Err(ConfigError::ValidationError(
                "queues.fs_limit must be > 0".into(),
            ));
        }
        if self.cache.file_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "cache.file_name must not be empty".into(),
            ));
        }
        if self.tools.jpeg_quality == 0 || self.tools.jpeg_quality > 100 {
            return Err(ConfigError::ValidationError(
                "tools.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.derived.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[derived]] entry is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.derived {
            if spec.size_limit == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "derived.size_limit must be > 0 ({})",
                    spec.file_name
                )));
            }
            if spec.file_name.is_empty()
                || spec.file_name.contains('/')
                || spec.file_name.contains('\\')
            {
                return Err(ConfigError::ValidationError(format!(
                    "derived.file_name must be a plain file name, got {:?}",
                    spec.file_name
                )));
            }
            if !seen.insert(spec.file_name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "derived.file_name {:?} is used twice",
                    spec.file_name
                )));
            }
        }
        Ok(())
    }
}
