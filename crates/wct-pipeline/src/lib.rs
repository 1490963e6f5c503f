//! WCT pipeline: categorize, analyze and clean up wildcard corpora.
//!
//! A *wildcard file* is a plain list of interchangeable phrase fragments, one
//! per line, that a template-expansion engine samples from. Over time these
//! files accumulate duplicates, mixed concerns and references to other files.
//! This crate runs them through a reasoning model in four stages:
//!
//! ```text
//! ┌──────────────┐    ┌────────────┐    ┌────────────┐    ┌──────────┐
//! │  categorize  │───►│  analyze   │───►│  cleanup   │───►│  format  │
//! │ (cached per  │    │ short|long │    │ (needs the │    │ text|yaml│
//! │   corpus)    │    │            │    │ long report│    │          │
//! └──────┬───────┘    └─────▲──────┘    └─────▲──────┘    └──────────┘
//!        │                  │                 │
//!        ▼                  │                 │
//!  ┌───────────┐      ┌─────┴─────────────────┴─────┐
//!  │  result   │      │ category filter (drops pure │
//!  │  cache    │      │ `__ref__` placeholders)      │
//!  └───────────┘      └─────────────────────────────┘
//! ```
//!
//! The model is **untrusted**: its output goes through a tiered
//! [`parser`] that always yields *some* [`CategoricalStructure`], and every
//! later stage tolerates a degenerate structure carrying only the raw text.
//!
//! Only oracle and configuration failures abort a run; cache corruption and
//! unparsable model output degrade gracefully.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod error;
pub mod filter;
pub mod oracle;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod structure;

pub use cache::{CacheError, ResultCache};
pub use config::{ConfigError, PipelineConfig};
pub use corpus::Corpus;
pub use error::PipelineError;
pub use filter::filter;
pub use oracle::{MockOracle, Oracle, OracleCall, OracleError};
pub use parser::parse;
pub use pipeline::{AnalysisMode, OutputFormat, Pipeline, RunReport, RunRequest, StageNode};
pub use prompts::PromptLibrary;
pub use structure::CategoricalStructure;
