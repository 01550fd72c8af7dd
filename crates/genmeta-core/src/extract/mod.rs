//! Metadata extraction from decoded `tEXt` chunks.
//!
//! - **models**: Ordered, de-duplicated model name set
//! - **graph**: Prompts and models from a node-graph `prompt` chunk
//! - **parameters**: Prompts, models and size from a `parameters` string
//! - **assemble**: Precedence rules and the final [`Metadata`](crate::Metadata) record

pub mod assemble;
pub mod graph;
pub mod models;
pub mod parameters;

pub use assemble::{assemble, derive_prompt, extract, DerivedPrompt, TextFields};
pub use graph::{extract_graph, GraphExtraction, InputValue, NodeGraph, NodeRecord};
pub use models::ModelSet;
pub use parameters::{parse_parameters, ParameterExtraction};
