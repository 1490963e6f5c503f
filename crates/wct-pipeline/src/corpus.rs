use std::path::Path;

use crate::error::PipelineError;

/// A wildcard file loaded for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    identity: String,
    file_name: String,
    text: String,
    lines: Vec<String>,
}

impl Corpus {
    pub fn new(identity: impl Into<String>, file_name: impl Into<String>, text: &str) -> Self {
        Self {
            identity: identity.into(),
            file_name: file_name.into(),
            text: text.to_string(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Reads `path`; the identity is the file stem (`poses.txt` → `poses`).
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PipelineError::CorpusUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let identity = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "corpus".to_string());
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| identity.clone());
        Ok(Self::new(identity, file_name, &text))
    }

    /// Cache key.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The file text exactly as read, line endings included.
    pub fn content(&self) -> &str {
        &self.text
    }
}
