//! The categorical structure inferred for a corpus.
//!
//! A structure is a flat mapping from field name to value. Most fields are
//! *categories* (a sequence of entry strings); `purpose` and `raw_response`
//! are metadata that every stage passes through untouched. Anything else the
//! model decided to emit (descriptions, counts) is kept as-is.
//!
//! Values are stored as JSON-compatible trees so the same structure can be
//! cached as JSON and rendered as YAML for prompts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const PURPOSE_FIELD: &str = "purpose";
pub const RAW_RESPONSE_FIELD: &str = "raw_response";

/// Placeholder used in prompts when there is nothing to show.
pub const NO_CATEGORIES_TEXT: &str = "No categories available";

pub fn is_metadata_field(name: &str) -> bool {
    name == PURPOSE_FIELD || name == RAW_RESPONSE_FIELD
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoricalStructure {
    fields: BTreeMap<String, Value>,
}

impl CategoricalStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Degenerate structure wrapping model output that could not be decoded.
    pub fn from_raw_response(text: impl Into<String>) -> Self {
        let mut s = Self::new();
        s.insert(RAW_RESPONSE_FIELD, Value::String(text.into()));
        s
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.insert(PURPOSE_FIELD, Value::String(purpose.into()));
        self
    }

    pub fn with_category<I, S>(mut self, name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|e| Value::String(e.into()))
            .collect();
        self.insert(name, Value::Array(entries));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn purpose(&self) -> Option<&str> {
        self.get(PURPOSE_FIELD).and_then(Value::as_str)
    }

    pub fn raw_response(&self) -> Option<&str> {
        self.get(RAW_RESPONSE_FIELD).and_then(Value::as_str)
    }

    /// True when the model output could not be decoded at all.
    pub fn is_degenerate(&self) -> bool {
        self.raw_response().is_some() && self.categories().next().is_none()
    }

    /// Sequence-valued, non-metadata fields.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.fields.iter().filter_map(|(k, v)| match v {
            Value::Array(items) if !is_metadata_field(k) => Some((k.as_str(), items.as_slice())),
            _ => None,
        })
    }

    /// String entries of a category; `None` if the field is missing or not a sequence.
    pub fn entries(&self, category: &str) -> Option<Vec<&str>> {
        match self.get(category)? {
            Value::Array(items) => Some(items.iter().filter_map(Value::as_str).collect()),
            _ => None,
        }
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.fields)
            .unwrap_or_else(|e| format!("# categories could not be rendered: {e}\n"))
    }

    /// YAML as embedded in oracle prompts.
    pub fn prompt_text(&self) -> String {
        if self.is_empty() {
            NO_CATEGORIES_TEXT.to_string()
        } else {
            self.to_yaml()
        }
    }
}

impl FromIterator<(String, Value)> for CategoricalStructure {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, Value>> for CategoricalStructure {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}
