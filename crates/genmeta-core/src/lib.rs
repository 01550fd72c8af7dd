//! genmeta core - generation metadata extraction for PNG images.
//!
//! Image generators embed how an image was made in PNG `tEXt` chunks. Node
//! graph tools store a JSON graph under `prompt` (and the editor layout under
//! `workflow`); parameter-string tools store one semi-structured text blob
//! under `parameters`. This crate reads either and normalizes both into one
//! [`Metadata`] record.
//!
//! # Architecture
//!
//! ```text
//! bytes → Chunk Reader → IHDR size + tEXt pairs → graph prompt | parameter string → Metadata
//! ```
//!
//! [`extract`] works purely on an in-memory buffer and holds no state between
//! calls, so any number of images can be processed in parallel. The
//! [`pipeline`] module adds file discovery and reading on top.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bytes = std::fs::read("image.png")?;
//! let metadata = genmeta_core::extract(&bytes)?;
//! if let Some(prompt) = &metadata.prompt {
//!     println!("Prompt: {}", prompt.positive);
//! }
//! println!("Models: {:?}", metadata.models);
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod png;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, FormatError, PipelineError, PipelineResult};
pub use extract::extract;
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{DiscoveredFile, MetadataProcessor};
pub use types::{ExtractedImage, ExtractedPrompt, Metadata};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_extract_is_idempotent() {
        let bytes = png::testing::PngBuilder::new()
            .ihdr(4, 4)
            .text("parameters", "a\nNegative prompt: b\nSteps: 3, <lora:x:1>")
            .text("workflow", r#"{"last_node_id": 9}"#)
            .build();
        let first = serde_json::to_string(&extract(&bytes).unwrap()).unwrap();
        let second = serde_json::to_string(&extract(&bytes).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
