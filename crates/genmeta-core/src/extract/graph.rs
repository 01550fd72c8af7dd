//! Prompt and model extraction from a node-graph `prompt` chunk.
//!
//! The graph is a JSON object mapping node ids to
//! `{ "class_type": ..., "inputs": { ... } }`. An input is either a literal
//! or a `[node_id, slot]` link to another node's output. Nodes are visited in
//! the order they appear in the source JSON, which decides which text is the
//! positive prompt and which is the negative one.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::models::ModelSet;
use crate::types::ExtractedPrompt;

/// Node kinds whose inputs hold human-written prompt text.
const CLIP_TEXT_ENCODE: &str = "CLIPTextEncode";
const PRIMITIVE_STRING_MULTILINE: &str = "PrimitiveStringMultiline";

/// Input keys consulted, in priority order, when following a link to a text node.
const PROMPT_INPUT_KEYS: [&str; 5] = ["prompt_text", "text", "value", "string", "prompt"];

/// Input keys that name a model file on any node.
pub const MODEL_INPUT_KEYS: [&str; 8] = [
    "ckpt_name",
    "lora_name",
    "unet_name",
    "clip_name",
    "vae_name",
    "model_name",
    "clip_name1",
    "clip_name2",
];

/// A single node input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    String(String),
    Number(serde_json::Number),
    /// Link to output `slot` of node `node`
    Reference { node: String, slot: u64 },
    Other,
}

impl InputValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::String(s.clone()),
            Value::Number(n) => Self::Number(n.clone()),
            Value::Array(items) => Self::reference(items).unwrap_or(Self::Other),
            _ => Self::Other,
        }
    }

    fn reference(items: &[Value]) -> Option<Self> {
        let [node, slot] = items else {
            return None;
        };
        let node = match node {
            Value::String(s) => s.clone(),
            Value::Number(n) if n.is_u64() => n.to_string(),
            _ => return None,
        };
        Some(Self::Reference {
            node,
            slot: slot.as_u64()?,
        })
    }

    /// The trimmed string value, if this is a non-blank string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            _ => None,
        }
    }
}

/// One processing node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub class_type: String,
    pub inputs: HashMap<String, InputValue>,
}

impl NodeRecord {
    /// Nodes without an `inputs` object carry nothing usable and are dropped.
    fn from_json(value: &Value) -> Option<Self> {
        let node = value.as_object()?;
        let inputs = node.get("inputs")?.as_object()?;
        Some(Self {
            class_type: node
                .get("class_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            inputs: inputs
                .iter()
                .map(|(k, v)| (k.clone(), InputValue::from_json(v)))
                .collect(),
        })
    }

    pub fn input(&self, key: &str) -> Option<&InputValue> {
        self.inputs.get(key)
    }
}

/// The parsed node graph, in source order.
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: Vec<(String, NodeRecord)>,
    index: HashMap<String, usize>,
}

impl NodeGraph {
    /// Build from the parsed `prompt` JSON. Returns `None` if it is not an object.
    ///
    /// Relies on `serde_json`'s `preserve_order` so nodes keep source order.
    pub fn from_json(value: &Value) -> Option<Self> {
        let mut graph = Self::default();
        for (id, node) in value.as_object()? {
            if let Some(record) = NodeRecord::from_json(node) {
                graph.index.insert(id.clone(), graph.nodes.len());
                graph.nodes.push((id.clone(), record));
            }
        }
        Some(graph)
    }

    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.index.get(id).map(|&i| &self.nodes[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distinct prompt texts in node order.
    pub fn prompt_texts(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut texts = Vec::new();

        for (_, node) in self.iter() {
            let text = match node.class_type.as_str() {
                PRIMITIVE_STRING_MULTILINE => {
                    node.input("value").and_then(InputValue::as_text).map(str::to_string)
                }
                CLIP_TEXT_ENCODE => match node.input("text") {
                    Some(InputValue::Reference { node: target, .. }) => {
                        self.resolve_reference(target)
                    }
                    Some(value) => value.as_text().map(str::to_string),
                    None => None,
                },
                _ => None,
            };

            if let Some(text) = text {
                if seen.insert(text.clone()) {
                    texts.push(text);
                }
            }
        }

        texts
    }

    /// Follow a link to the first non-blank prompt string it leads to.
    ///
    /// Links are followed depth-first in priority-key order on an explicit
    /// work stack, so neither chain length nor cycles can exhaust the thread
    /// stack. Each node is entered at most once.
    pub fn resolve_reference(&self, target: &str) -> Option<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = vec![target];

        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                tracing::debug!(node = id, "reference cycle in prompt graph, skipping");
                continue;
            }
            let Some(node) = self.node(id) else {
                continue;
            };

            for key in PROMPT_INPUT_KEYS {
                if let Some(text) = node.input(key).and_then(InputValue::as_text) {
                    return Some(text.to_string());
                }
            }

            // Reversed so the highest-priority link is popped first.
            for key in PROMPT_INPUT_KEYS.iter().rev() {
                if let Some(InputValue::Reference { node: next, .. }) = node.input(key) {
                    pending.push(next);
                }
            }
        }

        None
    }

    /// Model names from every node, in node then key order.
    pub fn models(&self) -> ModelSet {
        let mut models = ModelSet::new();
        for (_, node) in self.iter() {
            for key in MODEL_INPUT_KEYS {
                if let Some(name) = node.input(key).and_then(InputValue::as_text) {
                    models.add(name);
                }
            }
        }
        models
    }
}

/// What the graph path produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphExtraction {
    pub texts: Vec<String>,
    pub models: Vec<String>,
}

impl GraphExtraction {
    /// First text is positive, second negative, anything after is dropped.
    pub fn prompt(&self) -> Option<ExtractedPrompt> {
        let mut texts = self.texts.iter();
        let prompt = ExtractedPrompt::new(texts.next()?.clone());
        Some(match texts.next() {
            Some(negative) => prompt.with_negative(negative.clone()),
            None => prompt,
        })
    }
}

/// Run prompt and model extraction over a parsed `prompt` JSON value.
pub fn extract_graph(value: &Value) -> Option<GraphExtraction> {
    let graph = NodeGraph::from_json(value)?;
    tracing::trace!(nodes = graph.len(), "parsed prompt graph");
    Some(GraphExtraction {
        texts: graph.prompt_texts(),
        models: graph.models().into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: Value) -> NodeGraph {
        NodeGraph::from_json(&value).unwrap()
    }

    #[test]
    fn test_two_literal_encoders() {
        let value = json!({
            "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "A", "clip": ["4", 1] } },
            "7": { "class_type": "CLIPTextEncode", "inputs": { "text": "B", "clip": ["4", 1] } }
        });
        let out = extract_graph(&value).unwrap();
        assert_eq!(
            out.prompt(),
            Some(ExtractedPrompt::new("A").with_negative("B"))
        );
    }

    #[test]
    fn test_source_order_not_id_order() {
        let value: Value = serde_json::from_str(
            r#"{
                "9": { "class_type": "CLIPTextEncode", "inputs": { "text": "first" } },
                "10": { "class_type": "CLIPTextEncode", "inputs": { "text": "second" } },
                "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "third" } }
            }"#,
        )
        .unwrap();
        assert_eq!(graph(value).prompt_texts(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_single_text_has_no_negative() {
        let value = json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": "  lone prompt  " } }
        });
        let prompt = extract_graph(&value).unwrap().prompt().unwrap();
        assert_eq!(prompt.positive, "lone prompt");
        assert!(prompt.negative.is_none());
    }

    #[test]
    fn test_extra_texts_are_dropped() {
        let out = GraphExtraction {
            texts: vec!["a".into(), "b".into(), "c".into()],
            models: vec![],
        };
        assert_eq!(out.prompt(), Some(ExtractedPrompt::new("a").with_negative("b")));
    }

    #[test]
    fn test_no_texts_no_prompt() {
        let value = json!({
            "3": { "class_type": "KSampler", "inputs": { "seed": 42 } }
        });
        assert_eq!(extract_graph(&value).unwrap().prompt(), None);
    }

    #[test]
    fn test_duplicate_texts_collapse() {
        let value = json!({
            "1": { "class_type": "PrimitiveStringMultiline", "inputs": { "value": "same" } },
            "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "same" } },
            "3": { "class_type": "CLIPTextEncode", "inputs": { "text": "other" } }
        });
        assert_eq!(graph(value).prompt_texts(), vec!["same", "other"]);
    }

    #[test]
    fn test_blank_texts_are_skipped() {
        let value = json!({
            "1": { "class_type": "PrimitiveStringMultiline", "inputs": { "value": "   " } },
            "2": { "class_type": "CLIPTextEncode", "inputs": { "text": "" } },
            "3": { "class_type": "CLIPTextEncode", "inputs": { "text": "kept" } }
        });
        assert_eq!(graph(value).prompt_texts(), vec!["kept"]);
    }

    #[test]
    fn test_other_class_text_ignored() {
        let value = json!({
            "1": { "class_type": "Note", "inputs": { "text": "not a prompt" } },
            "2": { "class_type": "ShowText", "inputs": { "value": "nor this" } }
        });
        assert!(graph(value).prompt_texts().is_empty());
    }

    #[test]
    fn test_reference_resolves_by_key_priority() {
        let value = json!({
            "5": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": ["12", 0] }
            },
            "12": {
                "class_type": "PromptBuilder",
                "inputs": { "prompt": "low priority", "text": "high priority", "prompt_text": "" }
            }
        });
        assert_eq!(graph(value).prompt_texts(), vec!["high priority"]);
    }

    #[test]
    fn test_reference_chain() {
        let value = json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": ["2", 0] } },
            "2": { "class_type": "StringConcat", "inputs": { "string": ["3", 0] } },
            "3": { "class_type": "Primitive", "inputs": { "value": "  deep text " } }
        });
        assert_eq!(graph(value).prompt_texts(), vec!["deep text"]);
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let value = json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": ["2", 0] } },
            "2": { "class_type": "Relay", "inputs": { "text": ["3", 0] } },
            "3": { "class_type": "Relay", "inputs": { "text": ["2", 0] } }
        });
        assert!(graph(value).prompt_texts().is_empty());
    }

    #[test]
    fn test_self_reference_terminates() {
        let value = json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": ["1", 0] } }
        });
        assert!(graph(value).prompt_texts().is_empty());
    }

    #[test]
    fn test_dangling_reference() {
        let g = graph(json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": ["99", 0] } }
        }));
        assert!(g.prompt_texts().is_empty());
        assert_eq!(g.resolve_reference("99"), None);
    }

    #[test]
    fn test_numeric_node_id_reference() {
        let value = json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": [2, 0] } },
            "2": { "class_type": "Primitive", "inputs": { "value": "numeric link" } }
        });
        assert_eq!(graph(value).prompt_texts(), vec!["numeric link"]);
    }

    #[test]
    fn test_input_value_shapes() {
        assert_eq!(
            InputValue::from_json(&json!(["4", 1])),
            InputValue::Reference {
                node: "4".into(),
                slot: 1
            }
        );
        assert_eq!(InputValue::from_json(&json!(["4"])), InputValue::Other);
        assert_eq!(InputValue::from_json(&json!(["4", "x"])), InputValue::Other);
        assert_eq!(InputValue::from_json(&json!(["4", 1, 2])), InputValue::Other);
        assert_eq!(InputValue::from_json(&json!(null)), InputValue::Other);
        assert!(matches!(InputValue::from_json(&json!(7.5)), InputValue::Number(_)));
    }

    #[test]
    fn test_models_across_all_nodes() {
        let value = json!({
            "4": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "sdxl.safetensors" } },
            "10": {
                "class_type": "LoraLoader",
                "inputs": { "lora_name": "detail.safetensors", "model": ["4", 0] }
            },
            "11": {
                "class_type": "DualCLIPLoader",
                "inputs": { "clip_name1": "clip_l.safetensors", "clip_name2": "t5xxl.safetensors" }
            },
            "12": { "class_type": "VAELoader", "inputs": { "vae_name": " ae.sft " } },
            "13": { "class_type": "CheckpointLoaderSimple", "inputs": { "ckpt_name": "sdxl.safetensors" } },
            "14": { "class_type": "UNETLoader", "inputs": { "unet_name": "" } }
        });
        assert_eq!(
            graph(value).models().into_vec(),
            vec![
                "sdxl.safetensors",
                "detail.safetensors",
                "clip_l.safetensors",
                "t5xxl.safetensors",
                "ae.sft"
            ]
        );
    }

    #[test]
    fn test_model_key_order_within_node() {
        let value = json!({
            "1": {
                "class_type": "Loader",
                "inputs": { "vae_name": "v", "ckpt_name": "c", "lora_name": "l" }
            }
        });
        assert_eq!(graph(value).models().into_vec(), vec!["c", "l", "v"]);
    }

    #[test]
    fn test_non_object_graph() {
        assert!(extract_graph(&json!([1, 2, 3])).is_none());
        assert!(extract_graph(&json!("text")).is_none());
    }

    #[test]
    fn test_nodes_without_inputs_skipped() {
        let g = graph(json!({
            "1": { "class_type": "CLIPTextEncode" },
            "2": "garbage",
            "3": { "class_type": "CLIPTextEncode", "inputs": { "text": "ok" } }
        }));
        assert_eq!(g.len(), 1);
        assert!(g.node("3").is_some());
        assert!(g.node("1").is_none());
    }

    #[test]
    fn test_deep_reference_chain_resolves() {
        const DEPTH: usize = 150_000;
        let mut nodes = serde_json::Map::new();
        nodes.insert(
            "0".into(),
            json!({ "class_type": "CLIPTextEncode", "inputs": { "text": ["1", 0] } }),
        );
        for i in 1..DEPTH {
            nodes.insert(
                i.to_string(),
                json!({ "class_type": "Reroute", "inputs": { "text": [(i + 1).to_string(), 0] } }),
            );
        }
        nodes.insert(
            DEPTH.to_string(),
            json!({ "class_type": "Primitive", "inputs": { "value": "end of chain" } }),
        );

        let g = graph(Value::Object(nodes));
        assert_eq!(g.prompt_texts(), vec!["end of chain"]);
    }

    #[test]
    fn test_later_link_tried_after_dead_end() {
        let value = json!({
            "1": { "class_type": "CLIPTextEncode", "inputs": { "text": ["2", 0] } },
            "2": { "class_type": "Switch", "inputs": { "text": ["missing", 0], "value": ["3", 0] } },
            "3": { "class_type": "Primitive", "inputs": { "string": "second branch" } }
        });
        assert_eq!(graph(value).prompt_texts(), vec!["second branch"]);
    }
}
