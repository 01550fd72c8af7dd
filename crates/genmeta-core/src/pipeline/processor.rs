//! Pipeline orchestration - validation, reading and extraction for one file.

use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{file_name, ExtractedImage};

use super::discovery::{DiscoveredFile, FileDiscovery};
use super::validate::Validator;

/// Turns PNG files on disk into [`ExtractedImage`] records.
///
/// Holds no per-file state, so one processor can be shared across threads.
pub struct MetadataProcessor {
    validator: Validator,
    discovery: FileDiscovery,
}

impl MetadataProcessor {
    /// Create a new processor with the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            validator: Validator::new(config.limits.clone()),
            discovery: FileDiscovery::new(config.processing.clone()),
        }
    }

    /// Extract metadata from a single file.
    pub fn process(&self, path: &Path) -> PipelineResult<ExtractedImage> {
        let start = Instant::now();
        tracing::debug!("Processing: {:?}", path);

        let file_size = self.validator.validate(path)?;

        let bytes = std::fs::read(path).map_err(|e| PipelineError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let metadata = crate::extract::extract(&bytes).map_err(|source| PipelineError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            "Extracted {:?} in {:?} (prompt: {}, models: {})",
            path,
            start.elapsed(),
            metadata.prompt.is_some(),
            metadata.models.len()
        );

        Ok(ExtractedImage {
            file_path: path.to_path_buf(),
            file_name: file_name(path),
            file_size,
            metadata: Some(metadata),
            error: None,
        })
    }

    /// Like [`process`](Self::process), but a failure becomes an error record.
    pub fn process_lenient(&self, path: &Path) -> ExtractedImage {
        self.process(path).unwrap_or_else(|e| {
            tracing::warn!("Failed: {:?} - {}", path, e);
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            ExtractedImage::failure(path, size, e.to_string())
        })
    }

    /// Discover all supported files at a path.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        self.discovery.discover(path)
    }
}
