//! A deterministic, network-free oracle.
//!
//! It answers each stage from the corpus embedded in the request, so the
//! whole pipeline can be exercised without credentials:
//! - categorize: one `entries` category of distinct lines (references split out)
//! - analyze: line / distinct / duplicate counts
//! - cleanup: distinct lines in first-seen order
//! - format: the cleaned lines as a YAML `entries` list

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

use super::{Oracle, OracleError};
use crate::filter::is_placeholder;
use crate::pipeline::{
    ANALYSIS_HEADER, CLEANED_CONTENT_HEADER, CORPUS_CONTENT_HEADER, FILENAME_PREFIX, MODE_PREFIX,
    ORIGINAL_CONTENT_HEADER, OUTPUT_FORMAT_PREFIX,
};

#[derive(Debug, Clone, Default)]
pub struct OfflineOracle;

impl OfflineOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Oracle for OfflineOracle {
    fn complete(&self, _system: &str, user: &str) -> Result<String, OracleError> {
        let file_name = user
            .lines()
            .find_map(|l| l.strip_prefix(FILENAME_PREFIX))
            .unwrap_or("unknown")
            .trim();

        let text = if let Some(cleaned) = trailing_section(user, CLEANED_CONTENT_HEADER)
            .filter(|_| user.contains(OUTPUT_FORMAT_PREFIX))
        {
            format_yaml(cleaned)
        } else if user.contains(ANALYSIS_HEADER) {
            let content = trailing_section(user, ORIGINAL_CONTENT_HEADER).unwrap_or_default();
            distinct_lines(content).join("\n")
        } else if let Some(mode) = user.lines().find_map(|l| l.strip_prefix(MODE_PREFIX)) {
            let content = trailing_section(user, CORPUS_CONTENT_HEADER).unwrap_or_default();
            analysis(file_name, mode.trim(), content)
        } else {
            let content = trailing_section(user, CORPUS_CONTENT_HEADER).unwrap_or_default();
            categorize(file_name, content)
        };
        Ok(text)
    }

    fn name(&self) -> &str {
        "mock:offline"
    }
}

fn trailing_section<'a>(user: &'a str, header: &str) -> Option<&'a str> {
    user.split_once(header).map(|(_, rest)| rest)
}

fn distinct_lines(content: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.to_lowercase()))
        .collect()
}

fn categorize(file_name: &str, content: &str) -> String {
    let (references, entries): (Vec<&str>, Vec<&str>) =
        distinct_lines(content).into_iter().partition(|l| is_placeholder(l));

    let mut doc: BTreeMap<&str, Value> = BTreeMap::new();
    doc.insert("purpose", json!(format!("entries of {file_name}")));
    doc.insert("entries", json!(entries));
    if !references.is_empty() {
        doc.insert("references", json!(references));
    }
    let yaml = serde_yaml::to_string(&doc).unwrap_or_default();
    format!("Offline categorization.\n\n```yaml\n{yaml}```\n")
}

fn analysis(file_name: &str, mode: &str, content: &str) -> String {
    let total = content.lines().filter(|l| !l.trim().is_empty()).count();
    let distinct = distinct_lines(content).len();
    let mut out = format!(
        "{file_name}: {total} entries, {distinct} distinct, {} duplicates",
        total - distinct
    );
    if mode == "long" {
        let placeholders = content.lines().filter(|l| is_placeholder(l)).count();
        out.push_str(&format!(
            "\nreferences: {placeholders}\nrecommendation: remove duplicates, keep first occurrence"
        ));
    }
    out
}

fn format_yaml(cleaned: &str) -> String {
    let doc = json!({ "entries": distinct_lines(cleaned) });
    serde_yaml::to_string(&doc).unwrap_or_default()
}
