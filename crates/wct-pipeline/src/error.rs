use std::path::PathBuf;

use crate::oracle::OracleError;

/// Errors that terminate a pipeline run.
///
/// Cache and parse problems never show up here: they degrade to a cache miss
/// or a raw-text structure instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("prompt `{name}` not found (searched: {searched})")]
    PromptNotFound { name: String, searched: String },

    #[error("failed to read prompt {}: {source}", path.display())]
    PromptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read corpus {}: {source}", path.display())]
    CorpusUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no action requested (expected at least one of categorize, analyze, cleanup)")]
    NothingRequested,

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
