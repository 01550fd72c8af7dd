//! Parser for the free-form `parameters` text chunk.
//!
//! Layout, loosely:
//!
//! ```text
//! <positive prompt, possibly several lines>
//! Negative prompt: <negative prompt>
//! Steps: 30, Sampler: DPM++ 2M, Size: 832x1216, Model: foo, VAE: bar, Lora hashes: "a: 1, b: 2"
//! ```
//!
//! Some writers instead put the whole positive prompt in a double-quoted,
//! backslash-escaped literal at the very start. The prompt split is done with
//! plain marker searches. Small anchored patterns then read model and size
//! fields out of the trailing metadata segment. `regex` runs in linear time,
//! so adversarial strings cannot blow up the scan.

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::ModelSet;
use crate::types::ExtractedPrompt;

const NEGATIVE_MARKER: &str = "\nNegative prompt:";

/// Leading `"..."` literal with backslash escapes.
static QUOTED_PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"((?s:[^"\\]|\\.)*)""#).expect("valid regex"));

static ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\(.)").expect("valid regex"));

static STEPS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\nSteps:\s*[0-9]+").expect("valid regex"));

static MODEL_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\nModel:").expect("valid regex"));

/// First metadata line, whichever of `Steps:` or `Model:` comes first.
static METADATA_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\nSteps:\s*[0-9]+|\nModel:").expect("valid regex"));

static LORA_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<lora:([^>:]+)(?::[^>]+)?>").expect("valid regex"));

static MODEL_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Model:\s*([^,\n]+)").expect("valid regex"));

static VAE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)VAE:\s*([^,\n]+)").expect("valid regex"));

static LORA_HASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)Lora hashes:\s*"([^"]+)""#).expect("valid regex"));

static SIZE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Size:\s*([0-9]+)\s*[x\x{D7}]\s*([0-9]+)").expect("valid regex")
});

/// What the parameter-string path produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterExtraction {
    pub prompt: ExtractedPrompt,
    pub models: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Result of splitting off the prompt texts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PromptSplit<'a> {
    positive: String,
    negative: Option<&'a str>,
    /// Metadata segment scanned for models and size
    scan: &'a str,
    /// Raw quoted literal, a secondary source for the scans
    literal: Option<&'a str>,
}

/// Parse a `parameters` string.
///
/// Returns `None` when the string is blank or no positive prompt can be isolated.
pub fn parse_parameters(parameters: &str) -> Option<ParameterExtraction> {
    let trimmed = parameters.trim();
    if trimmed.is_empty() {
        return None;
    }

    let split = split_prompt(trimmed);
    if split.positive.is_empty() {
        return None;
    }

    let negative = split
        .negative
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != split.positive.trim());

    let models = scan_models(split.scan, split.literal);
    let (width, height) = match scan_size(split.scan, split.literal) {
        Some((w, h)) => (Some(w), Some(h)),
        None => (None, None),
    };

    let mut prompt = ExtractedPrompt::new(split.positive);
    if let Some(negative) = negative {
        prompt = prompt.with_negative(negative);
    }

    Some(ParameterExtraction {
        prompt,
        models: models.into_vec(),
        width,
        height,
    })
}

/// Quoted form, then `Negative prompt:` form, then unlabeled form.
fn split_prompt(trimmed: &str) -> PromptSplit<'_> {
    if let Some(caps) = QUOTED_PROMPT.captures(trimmed) {
        let literal = caps.get(1).map_or("", |m| m.as_str());
        let end = caps.get(0).map_or(0, |m| m.end());
        return PromptSplit {
            positive: ESCAPE.replace_all(literal, "$1").into_owned(),
            negative: None,
            scan: &trimmed[end..],
            literal: Some(literal),
        };
    }

    if let Some(neg_idx) = trimmed.find(NEGATIVE_MARKER) {
        let positive = trimmed[..neg_idx].trim().to_string();
        let after = &trimmed[neg_idx + NEGATIVE_MARKER.len()..];
        return match STEPS_MARKER.find(after) {
            Some(steps) => PromptSplit {
                positive,
                negative: Some(&after[..steps.start()]),
                scan: &after[steps.start()..],
                literal: None,
            },
            None => PromptSplit {
                positive,
                negative: Some(after),
                scan: MODEL_MARKER
                    .find(trimmed)
                    .map_or("", |m| &trimmed[m.start()..]),
                literal: None,
            },
        };
    }

    match METADATA_BOUNDARY.find(trimmed) {
        Some(boundary) => PromptSplit {
            positive: trimmed[..boundary.start()].trim().to_string(),
            negative: None,
            scan: &trimmed[boundary.start()..],
            literal: None,
        },
        None => PromptSplit {
            positive: trimmed.to_string(),
            negative: None,
            scan: "",
            literal: None,
        },
    }
}

/// LoRA tags, then `Model:`, then `VAE:`, then `Lora hashes:` entries.
///
/// LoRA tags are collected from the literal and the tail in reading order.
/// Single-valued fields come from the tail, and from the literal only when
/// the tail has none.
fn scan_models(tail: &str, literal: Option<&str>) -> ModelSet {
    let mut models = ModelSet::new();

    for segment in literal.into_iter().chain([tail]) {
        for caps in LORA_TAG.captures_iter(segment) {
            if let Some(name) = caps.get(1) {
                models.add(name.as_str());
            }
        }
    }

    for field in [&*MODEL_FIELD, &*VAE_FIELD] {
        if let Some(value) = first_capture(field, tail, literal) {
            models.add(value);
        }
    }

    if let Some(block) = first_capture(&LORA_HASHES, tail, literal) {
        for pair in block.split(',') {
            if let Some((name, _hash)) = pair.trim().split_once(':') {
                models.add(name);
            }
        }
    }

    models
}

/// First capture group of `pattern` in `tail`, else in `fallback`.
fn first_capture<'a>(pattern: &Regex, tail: &'a str, fallback: Option<&'a str>) -> Option<&'a str> {
    std::iter::once(tail)
        .chain(fallback)
        .find_map(|segment| Some(pattern.captures(segment)?.get(1)?.as_str()))
}

fn scan_size(tail: &str, literal: Option<&str>) -> Option<(u32, u32)> {
    let caps = std::iter::once(tail)
        .chain(literal)
        .find_map(|segment| SIZE_FIELD.captures(segment))?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}
