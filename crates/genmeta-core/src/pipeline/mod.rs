//! File-level pipeline around the in-memory extractor.
//!
//! - **discovery**: Find PNG files in directories
//! - **validate**: Cheap checks before a file is read in full
//! - **processor**: Read, extract and wrap the result for one file

pub mod discovery;
pub mod processor;
pub mod validate;

// Re-exports for convenient access
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use processor::MetadataProcessor;
pub use validate::Validator;
