//! Strip synthetic categories before analysis and cleanup.
//!
//! Wildcard collections often contain "index" categories whose entries are
//! only references to other files, e.g. `__std/xl/pose__`. Those say nothing
//! about the corpus being curated, so the model should not see them as
//! categories of their own.

use serde_json::Value;

use crate::structure::{is_metadata_field, CategoricalStructure};

const REFERENCE_DELIMITER: &str = "__";

/// Removes every `__...__` reference token, returning what is left and how
/// many references were removed. An unterminated `__` is literal text.
fn strip_references(entry: &str) -> (String, usize) {
    let mut rest = String::new();
    let mut references = 0;
    let mut tail = entry;
    while let Some(open) = tail.find(REFERENCE_DELIMITER) {
        let after_open = &tail[open + REFERENCE_DELIMITER.len()..];
        let Some(close) = after_open.find(REFERENCE_DELIMITER) else {
            break;
        };
        rest.push_str(&tail[..open]);
        references += 1;
        tail = &after_open[close + REFERENCE_DELIMITER.len()..];
    }
    rest.push_str(tail);
    (rest, references)
}

/// True when `entry` is made only of references such as `__std/xl/pose__`
/// (one or several, with nothing but whitespace between them).
pub fn is_placeholder(entry: &str) -> bool {
    let (rest, references) = strip_references(entry);
    references > 0 && rest.trim().is_empty()
}

fn is_real_entry(entry: &Value) -> bool {
    match entry {
        Value::String(s) => !s.trim().is_empty() && !is_placeholder(s),
        _ => false,
    }
}

/// Returns a copy of `structure` without placeholder entries and without
/// categories that held nothing else. Idempotent.
pub fn filter(structure: &CategoricalStructure) -> CategoricalStructure {
    structure
        .fields()
        .filter_map(|(name, value)| {
            if is_metadata_field(name) {
                return Some((name.to_string(), value.clone()));
            }
            match value {
                Value::Array(entries) => {
                    let real: Vec<Value> =
                        entries.iter().filter(|e| is_real_entry(e)).cloned().collect();
                    if real.is_empty() {
                        None
                    } else {
                        Some((name.to_string(), Value::Array(real)))
                    }
                }
                other => Some((name.to_string(), other.clone())),
            }
        })
        .collect()
}
