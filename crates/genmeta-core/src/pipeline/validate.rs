//! Input validation before a file is read in full.

use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::png::{has_signature, PNG_SIGNATURE};

/// Validates files before processing.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Quick checks before extraction.
    ///
    /// Checks:
    /// - File exists and is readable
    /// - File size is within limits
    /// - File starts with the PNG signature
    ///
    /// Returns the file size in bytes.
    pub fn validate(&self, path: &Path) -> Result<u64, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(|e| PipelineError::Read {
            path: path.to_path_buf(),
            message: format!("Cannot read metadata: {}", e),
        })?;

        let max_bytes = self.limits.max_file_size_mb.saturating_mul(1024 * 1024);
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        self.check_signature(path)?;
        Ok(metadata.len())
    }

    fn check_signature(&self, path: &Path) -> Result<(), PipelineError> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::Read {
            path: path.to_path_buf(),
            message: format!("Cannot open file: {}", e),
        })?;

        let mut header = Vec::with_capacity(PNG_SIGNATURE.len());
        file.take(PNG_SIGNATURE.len() as u64)
            .read_to_end(&mut header)
            .map_err(|e| PipelineError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if !has_signature(&header) {
            return Err(PipelineError::NotPng {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}
