//! Decode free-form model output into a [`CategoricalStructure`].
//!
//! Models are asked for YAML but routinely wrap it in markdown, prefix it with
//! prose, or ignore the instruction entirely. Decoding is an ordered chain:
//!
//! 1. a fenced ```` ```yaml ```` block anywhere in the text;
//! 2. the whole text, when some line starts with `purpose:`;
//! 3. the raw text itself, wrapped as `raw_response`.
//!
//! The first decoder that *applies* decides. If it applies but cannot decode,
//! we go straight to the raw-text fallback, so [`parse`] never fails.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::structure::{CategoricalStructure, PURPOSE_FIELD};

const FENCE: &str = "```";
const FENCE_TAGS: [&str; 2] = ["```yaml", "```yml"];

/// `None`: not applicable. `Some(Err)`: applicable but undecodable.
type Decoder = fn(&str) -> Option<Result<CategoricalStructure, String>>;

const DECODERS: &[(&str, Decoder)] = &[
    ("fenced-yaml", decode_fenced_block),
    ("purpose-marker", decode_marked_document),
];

pub fn parse(raw: &str) -> CategoricalStructure {
    for (tier, decoder) in DECODERS {
        match decoder(raw) {
            None => continue,
            Some(Ok(structure)) => {
                tracing::debug!(tier, fields = structure.len(), "decoded model output");
                return structure;
            }
            Some(Err(reason)) => {
                tracing::debug!(tier, %reason, "could not decode model output; keeping raw text");
                break;
            }
        }
    }
    CategoricalStructure::from_raw_response(raw)
}

fn decode_fenced_block(raw: &str) -> Option<Result<CategoricalStructure, String>> {
    // Earliest fence in the text, whichever tag it uses.
    let (start, tag) = FENCE_TAGS
        .iter()
        .filter_map(|tag| raw.find(tag).map(|idx| (idx, *tag)))
        .min_by_key(|(idx, _)| *idx)?;
    let body = &raw[start + tag.len()..];
    let body = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    Some(decode_yaml_mapping(body.trim()))
}

fn decode_marked_document(raw: &str) -> Option<Result<CategoricalStructure, String>> {
    let marker = format!("{PURPOSE_FIELD}:");
    let marked = raw
        .lines()
        .any(|line| line.trim_start().starts_with(&marker));
    if !marked {
        return None;
    }
    Some(decode_yaml_mapping(raw))
}

fn decode_yaml_mapping(text: &str) -> Result<CategoricalStructure, String> {
    if text.trim().is_empty() {
        return Err("empty document".to_string());
    }
    // A scalar or list at the top level is not a structure.
    let fields = serde_yaml::from_str::<BTreeMap<String, Value>>(text).map_err(|e| e.to_string())?;
    if fields.is_empty() {
        return Err("document has no fields".to_string());
    }
    Ok(CategoricalStructure::from(fields))
}
