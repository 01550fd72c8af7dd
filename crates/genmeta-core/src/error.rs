//! Error types for genmeta.
//!
//! Errors are organized by stage. Only [`FormatError`] can abort an
//! extraction; every other anomaly inside a well-formed PNG (bad JSON,
//! unrecognized parameter strings, dangling node references) is absorbed
//! and simply leaves the corresponding output field empty.

use std::path::PathBuf;
use thiserror::Error;

/// The PNG stream itself is unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Fewer bytes than the 8-byte signature
    #[error("not a PNG file: only {len} bytes, too short for the PNG signature")]
    TooShort { len: usize },

    /// Signature bytes do not match
    #[error("not a PNG file: invalid signature")]
    InvalidSignature,

    /// Trailing bytes too few to hold a chunk header and CRC
    #[error("truncated PNG: partial chunk header at offset {offset} ({remaining} bytes left)")]
    TruncatedHeader { offset: usize, remaining: usize },

    /// A chunk claims more bytes than the buffer holds
    #[error(
        "truncated PNG: chunk {kind:?} at offset {offset} declares {declared} bytes but only {remaining} remain"
    )]
    TruncatedChunk {
        offset: usize,
        kind: String,
        declared: usize,
        remaining: usize,
    },
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
}

/// Errors raised while turning a file on disk into extracted metadata.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file could not be read
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// File does not start with the PNG signature
    #[error("Not a PNG image: {path}")]
    NotPng { path: PathBuf },

    /// The PNG stream is corrupt
    #[error("Failed to extract metadata from {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
