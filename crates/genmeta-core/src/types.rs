//! Core data types produced by extraction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prompt text recovered from either metadata format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPrompt {
    /// Positive prompt
    pub positive: String,

    /// Negative prompt, when one was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
}

impl ExtractedPrompt {
    pub fn new(positive: impl Into<String>) -> Self {
        Self {
            positive: positive.into(),
            negative: None,
        }
    }

    pub fn with_negative(mut self, negative: impl Into<String>) -> Self {
        self.negative = Some(negative.into());
        self
    }
}

/// Everything extracted from one PNG.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Prompt from the node graph, or else from the parameter string
    pub prompt: Option<ExtractedPrompt>,

    /// Parsed `workflow` JSON, passed through untouched
    pub workflow: Option<serde_json::Value>,

    /// The `parameters` text exactly as stored
    pub parameters: Option<String>,

    /// Every `tEXt` keyword and its decoded text
    pub raw: BTreeMap<String, String>,

    /// Model and component names in first-seen order
    pub models: Vec<String>,

    /// Image width from `IHDR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Image height from `IHDR`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Metadata {
    /// Whether any prompt, workflow or model was found.
    pub fn has_generation_data(&self) -> bool {
        self.prompt.is_some() || self.workflow.is_some() || !self.models.is_empty()
    }
}

/// Extraction result for one file on disk.
///
/// Exactly one of `metadata` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Path to the source file
    pub file_path: PathBuf,

    /// Just the filename portion
    pub file_name: String,

    /// File size in bytes
    pub file_size: u64,

    /// Extracted metadata, absent on failure
    pub metadata: Option<Metadata>,

    /// Failure description, absent on success
    pub error: Option<String>,
}

impl ExtractedImage {
    /// A record for a file that could not be extracted.
    pub fn failure(path: &Path, file_size: u64, error: impl Into<String>) -> Self {
        Self {
            file_path: path.to_path_buf(),
            file_name: file_name(path),
            file_size,
            metadata: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether extraction succeeded and found a prompt.
    pub fn has_prompt(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| m.prompt.is_some())
    }
}

/// The filename portion of `path`, or `"unknown"`.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_serializes_without_absent_negative() {
        let json = serde_json::to_value(ExtractedPrompt::new("a cat")).unwrap();
        assert_eq!(json, serde_json::json!({ "positive": "a cat" }));
    }

    #[test]
    fn test_empty_metadata_shape() {
        let json = serde_json::to_value(Metadata::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "prompt": null,
                "workflow": null,
                "parameters": null,
                "raw": {},
                "models": []
            })
        );
    }

    #[test]
    fn test_dimensions_serialized_when_present() {
        let meta = Metadata {
            width: Some(512),
            height: Some(768),
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["width"], 512);
        assert_eq!(json["height"], 768);
    }

    #[test]
    fn test_has_generation_data() {
        let mut meta = Metadata::default();
        meta.raw.insert("Software".into(), "editor".into());
        assert!(!meta.has_generation_data());
        meta.models.push("x.safetensors".into());
        assert!(meta.has_generation_data());
    }

    #[test]
    fn test_failure_record() {
        let image = ExtractedImage::failure(Path::new("/renders/broken.png"), 12, "bad signature");
        assert_eq!(image.file_name, "broken.png");
        assert!(!image.is_ok());
        assert!(!image.has_prompt());
        assert_eq!(image.error.as_deref(), Some("bad signature"));
    }
}
