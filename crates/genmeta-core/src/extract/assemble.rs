//! Merges chunk-level results into a single [`Metadata`] record.

use std::collections::BTreeMap;

use serde_json::Value;

use super::graph::extract_graph;
use super::parameters::{parse_parameters, ParameterExtraction};
use crate::error::FormatError;
use crate::png::{read_chunks, Dimensions, TextChunk};
use crate::types::{ExtractedPrompt, Metadata};

const PROMPT_KEYWORD: &str = "prompt";
const WORKFLOW_KEYWORD: &str = "workflow";
const PARAMETERS_KEYWORD: &str = "parameters";

/// The prompt and the models that came with it, tagged by source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedPrompt {
    /// From the `prompt` node graph
    Graph {
        prompt: ExtractedPrompt,
        models: Vec<String>,
    },
    /// From the `parameters` string
    Parameters(ParameterExtraction),
}

impl DerivedPrompt {
    pub fn prompt(&self) -> &ExtractedPrompt {
        match self {
            Self::Graph { prompt, .. } => prompt,
            Self::Parameters(p) => &p.prompt,
        }
    }
}

/// Decoded `tEXt` chunks, with the known keywords picked out.
#[derive(Debug, Clone, Default)]
pub struct TextFields {
    pub raw: BTreeMap<String, String>,
    pub graph: Option<Value>,
    pub workflow: Option<Value>,
    pub parameters: Option<String>,
}

impl TextFields {
    /// Decode every payload. Later chunks overwrite earlier ones for the
    /// same keyword, except that JSON that fails to parse never replaces a
    /// value that did parse.
    pub fn collect<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut fields = Self::default();
        for payload in payloads {
            let TextChunk { keyword, text } = TextChunk::decode(payload);
            match keyword.as_str() {
                PROMPT_KEYWORD => {
                    if let Some(value) = parse_json(&keyword, &text) {
                        fields.graph = Some(value);
                    }
                }
                WORKFLOW_KEYWORD => {
                    if let Some(value) = parse_json(&keyword, &text) {
                        fields.workflow = Some(value);
                    }
                }
                PARAMETERS_KEYWORD => fields.parameters = Some(text.clone()),
                _ => {}
            }
            fields.raw.insert(keyword, text);
        }
        fields
    }
}

fn parse_json(keyword: &str, text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(keyword, error = %e, "tEXt value is not valid JSON, keeping it as raw text");
            None
        }
    }
}

/// Graph first; the parameter string only when the graph gave no prompt.
pub fn derive_prompt(graph: Option<&Value>, parameters: Option<&str>) -> Option<DerivedPrompt> {
    if let Some(extraction) = graph.and_then(extract_graph) {
        if let Some(prompt) = extraction.prompt() {
            return Some(DerivedPrompt::Graph {
                prompt,
                models: extraction.models,
            });
        }
        tracing::debug!("prompt graph has no prompt text, trying parameters");
    }

    let parsed = parse_parameters(parameters?);
    if parsed.is_none() {
        tracing::debug!("parameters text has no recognizable prompt");
    }
    parsed.map(DerivedPrompt::Parameters)
}

/// Build the final record.
///
/// `IHDR` dimensions are authoritative. A `Size:` hint from the parameter
/// string only fills them in when the stream had no usable `IHDR`.
pub fn assemble(
    dimensions: Option<Dimensions>,
    fields: TextFields,
    derived: Option<DerivedPrompt>,
) -> Metadata {
    let (prompt, models, hint) = match derived {
        Some(DerivedPrompt::Graph { prompt, models }) => (Some(prompt), models, None),
        Some(DerivedPrompt::Parameters(p)) => {
            let hint = p.width.zip(p.height).map(|(width, height)| Dimensions { width, height });
            (Some(p.prompt), p.models, hint)
        }
        None => (None, Vec::new(), None),
    };
    let dimensions = dimensions.or(hint);

    Metadata {
        prompt,
        workflow: fields.workflow,
        parameters: fields.parameters,
        raw: fields.raw,
        models,
        width: dimensions.map(|d| d.width),
        height: dimensions.map(|d| d.height),
    }
}

/// Extract generation metadata from an in-memory PNG.
///
/// Fails only when the buffer is not a readable PNG chunk stream.
pub fn extract(bytes: &[u8]) -> Result<Metadata, FormatError> {
    let chunks = read_chunks(bytes)?;
    let fields = TextFields::collect(chunks.text_chunks.iter().copied());
    let derived = derive_prompt(fields.graph.as_ref(), fields.parameters.as_deref());
    Ok(assemble(chunks.dimensions, fields, derived))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::testing::PngBuilder;
    use serde_json::json;

    const TWO_ENCODERS: &str = r#"{
        "4": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "sdxl.safetensors" } },
        "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "A", "clip": ["4", 1] } },
        "7": { "class_type": "CLIPTextEncode", "inputs": { "text": "B", "clip": ["4", 1] } }
    }"#;

    #[test]
    fn test_graph_prompt_wins_over_parameters() {
        let bytes = PngBuilder::new()
            .ihdr(1024, 1024)
            .text("prompt", TWO_ENCODERS)
            .text("parameters", "other\nNegative prompt: x\nSteps: 1, Model: ignored")
            .iend()
            .build();
        let meta = extract(&bytes).unwrap();
        assert_eq!(
            meta.prompt,
            Some(ExtractedPrompt::new("A").with_negative("B"))
        );
        assert_eq!(meta.models, vec!["sdxl.safetensors"]);
        assert_eq!(
            meta.parameters.as_deref(),
            Some("other\nNegative prompt: x\nSteps: 1, Model: ignored")
        );
    }

    #[test]
    fn test_falls_back_to_parameters_when_graph_has_no_text() {
        let graph = r#"{ "4": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "g.safetensors" } } }"#;
        let bytes = PngBuilder::new()
            .ihdr(64, 64)
            .text("prompt", graph)
            .text("parameters", "a dog\nSteps: 20, Model: p.safetensors")
            .build();
        let meta = extract(&bytes).unwrap();
        assert_eq!(meta.prompt, Some(ExtractedPrompt::new("a dog")));
        assert_eq!(meta.models, vec!["p.safetensors"]);
    }

    #[test]
    fn test_no_prompt_means_no_models() {
        let graph = r#"{ "4": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "g.safetensors" } } }"#;
        let bytes = PngBuilder::new().ihdr(64, 64).text("prompt", graph).build();
        let meta = extract(&bytes).unwrap();
        assert!(meta.prompt.is_none());
        assert!(meta.models.is_empty());
    }

    #[test]
    fn test_ihdr_size_beats_parameter_size() {
        let bytes = PngBuilder::new()
            .ihdr(640, 480)
            .text("parameters", "p\nSteps: 20, Size: 512x768")
            .build();
        let meta = extract(&bytes).unwrap();
        assert_eq!((meta.width, meta.height), (Some(640), Some(480)));
    }

    #[test]
    fn test_parameter_size_fills_missing_ihdr() {
        let bytes = PngBuilder::new()
            .text("parameters", "p\nSteps: 20, Size: 512x768")
            .build();
        let meta = extract(&bytes).unwrap();
        assert_eq!((meta.width, meta.height), (Some(512), Some(768)));
    }

    #[test]
    fn test_graph_prompt_ignores_parameter_size() {
        let graph = r#"{"1": {"class_type": "CLIPTextEncode", "inputs": {"text": "g"}}}"#;
        let bytes = PngBuilder::new()
            .text("prompt", graph)
            .text("parameters", "p\nSteps: 20, Size: 512x768")
            .build();
        let meta = extract(&bytes).unwrap();
        assert_eq!((meta.width, meta.height), (None, None));
    }

    #[test]
    fn test_invalid_json_kept_raw_only() {
        let bytes = PngBuilder::new()
            .ihdr(1, 1)
            .text("prompt", "{not json")
            .text("workflow", "[1, 2")
            .build();
        let meta = extract(&bytes).unwrap();
        assert!(meta.prompt.is_none());
        assert!(meta.workflow.is_none());
        assert_eq!(meta.raw["prompt"], "{not json");
        assert_eq!(meta.raw["workflow"], "[1, 2");
    }

    #[test]
    fn test_workflow_passed_through() {
        let bytes = PngBuilder::new()
            .text("workflow", r#"{"nodes": [{"id": 3}], "version": 0.4}"#)
            .build();
        let meta = extract(&bytes).unwrap();
        assert_eq!(
            meta.workflow,
            Some(json!({ "nodes": [{ "id": 3 }], "version": 0.4 }))
        );
    }

    #[test]
    fn test_later_invalid_json_keeps_earlier_graph() {
        let fields = TextFields::collect([
            &b"prompt\0{\"1\": {\"class_type\": \"CLIPTextEncode\", \"inputs\": {\"text\": \"x\"}}}"[..],
            &b"prompt\0broken"[..],
        ]);
        assert!(fields.graph.is_some());
        assert_eq!(fields.raw["prompt"], "broken");
    }

    #[test]
    fn test_raw_holds_every_keyword() {
        let bytes = PngBuilder::new()
            .text("Software", "editor 1.2")
            .text("parameters", "cat")
            .text("prompt", "{}")
            .text("Comment", "")
            .build();
        let meta = extract(&bytes).unwrap();
        let keys: Vec<&str> = meta.raw.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Comment", "Software", "parameters", "prompt"]);
        assert_eq!(meta.raw["parameters"], "cat");
    }

    #[test]
    fn test_blank_parameters_no_prompt_but_raw() {
        let bytes = PngBuilder::new()
            .ihdr(8, 8)
            .text("parameters", "  \n  ")
            .build();
        let meta = extract(&bytes).unwrap();
        assert!(meta.prompt.is_none());
        assert_eq!(meta.parameters.as_deref(), Some("  \n  "));
        assert_eq!(meta.raw["parameters"], "  \n  ");
    }

    #[test]
    fn test_png_without_text() {
        let bytes = PngBuilder::new().ihdr(3, 5).iend().build();
        let meta = extract(&bytes).unwrap();
        assert_eq!(
            meta,
            Metadata {
                width: Some(3),
                height: Some(5),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_corrupt_signature_fails() {
        let mut bytes = PngBuilder::new().ihdr(3, 5).text("parameters", "x").build();
        bytes[0] = 0;
        assert_eq!(extract(&bytes).unwrap_err(), FormatError::InvalidSignature);
    }

    #[test]
    fn test_derive_prompt_without_sources() {
        assert_eq!(derive_prompt(None, None), None);
        assert_eq!(derive_prompt(Some(&json!("scalar")), None), None);
    }

    #[test]
    fn test_derived_prompt_accessor() {
        let derived = derive_prompt(None, Some("hello")).unwrap();
        assert_eq!(derived.prompt().positive, "hello");
        assert!(matches!(derived, DerivedPrompt::Parameters(_)));
    }
}
