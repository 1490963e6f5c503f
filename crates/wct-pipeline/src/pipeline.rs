//! Stage orchestration.
//!
//! Stages form a small dependency graph:
//!
//! ```text
//! Categorize ◄── Analyze(short)
//!     ▲
//!     ├───────── Analyze(long) ◄── Cleanup ◄── Format(text|yaml)
//!     └──────────────────────────────┘
//! ```
//!
//! [`RunRequest::plan`] resolves the requested actions into a topological
//! order where every node appears once, and [`Pipeline::run`] executes it,
//! handing each stage the outputs of its prerequisites. The per-stage methods
//! ([`Pipeline::analyze`], [`Pipeline::cleanup`], ...) can also be called on
//! their own; they fill in missing prerequisites themselves.

use std::collections::BTreeMap;
use std::fmt;

use crate::cache::ResultCache;
use crate::config::PipelineConfig;
use crate::corpus::Corpus;
use crate::error::PipelineError;
use crate::filter::filter;
use crate::oracle::{Oracle, OracleError};
use crate::parser::parse;
use crate::prompts::{self, PromptLibrary};
use crate::structure::CategoricalStructure;

pub const FILENAME_PREFIX: &str = "Wildcard filename: ";
pub const MODE_PREFIX: &str = "Mode: ";
pub const OUTPUT_FORMAT_PREFIX: &str = "Output format: ";
pub const CATEGORIES_HEADER: &str = "Categories:\n";
pub const CORPUS_CONTENT_HEADER: &str = "Wildcard file content:\n";
pub const ANALYSIS_HEADER: &str = "Analysis Results:\n";
pub const ORIGINAL_CONTENT_HEADER: &str = "Original Wildcard Content:\n";
pub const CLEANED_CONTENT_HEADER: &str = "Cleaned content to format:\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnalysisMode {
    /// Distribution summary / frequency table.
    Short,
    /// Detailed report; what cleanup works from.
    Long,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            other => Err(format!("unknown analysis mode `{other}` (expected short|long)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    #[default]
    Text,
    Yaml,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "yaml" => Ok(Self::Yaml),
            other => Err(format!("unknown output format `{other}` (expected text|yaml)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageNode {
    Categorize,
    Analyze(AnalysisMode),
    Cleanup,
    Format(OutputFormat),
}

impl StageNode {
    pub fn prerequisites(self) -> &'static [StageNode] {
        match self {
            Self::Categorize => &[],
            Self::Analyze(_) => &[Self::Categorize],
            Self::Cleanup => &[Self::Categorize, Self::Analyze(AnalysisMode::Long)],
            Self::Format(_) => &[Self::Cleanup],
        }
    }
}

impl fmt::Display for StageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Categorize => f.write_str("categorize"),
            Self::Analyze(mode) => write!(f, "analyze({mode})"),
            Self::Cleanup => f.write_str("cleanup"),
            Self::Format(output) => write!(f, "format({output})"),
        }
    }
}

/// Topological order of `targets` and everything they depend on, each once.
pub fn resolve_plan(targets: &[StageNode]) -> Vec<StageNode> {
    fn visit(node: StageNode, plan: &mut Vec<StageNode>) {
        if plan.contains(&node) {
            return;
        }
        for &dep in node.prerequisites() {
            visit(dep, plan);
        }
        plan.push(node);
    }

    let mut plan = Vec::new();
    for &target in targets {
        visit(target, &mut plan);
    }
    plan
}

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub categorize: bool,
    pub analyze: Option<AnalysisMode>,
    pub cleanup: bool,
    pub output: OutputFormat,
    pub force_refresh: bool,
}

impl RunRequest {
    pub fn is_empty(&self) -> bool {
        !self.categorize && self.analyze.is_none() && !self.cleanup
    }

    pub fn plan(&self) -> Vec<StageNode> {
        let mut targets = Vec::new();
        if self.categorize {
            targets.push(StageNode::Categorize);
        }
        if let Some(mode) = self.analyze {
            targets.push(StageNode::Analyze(mode));
        }
        if self.cleanup {
            targets.push(StageNode::Format(self.output));
        }
        resolve_plan(&targets)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub request: RunRequest,
    pub plan: Vec<StageNode>,
    /// As categorized (or cached), before filtering.
    pub categories: Option<CategoricalStructure>,
    pub analyses: BTreeMap<AnalysisMode, String>,
    pub cleaned: Option<String>,
    pub output: Option<String>,
}

impl RunReport {
    /// The analysis the caller asked for, if any.
    pub fn requested_analysis(&self) -> Option<(AnalysisMode, &str)> {
        let mode = self.request.analyze?;
        self.analyses.get(&mode).map(|text| (mode, text.as_str()))
    }

    /// Sectioned text for the terminal or `--save-to`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.request.categorize {
            if let Some(categories) = &self.categories {
                out.push_str("=== CATEGORIZATION RESULTS ===\n");
                out.push_str(&categories.to_yaml());
                out.push('\n');
            }
        }
        if let Some((mode, text)) = self.requested_analysis() {
            out.push_str(&format!(
                "=== ANALYSIS ({}) ===\n",
                mode.as_str().to_ascii_uppercase()
            ));
            out.push_str(text);
            out.push_str("\n\n");
        }
        if let Some(output) = &self.output {
            out.push_str("=== CLEANED OUTPUT ===\n");
            out.push_str(output);
        }
        out
    }
}

pub struct Pipeline<O> {
    prompts: PromptLibrary,
    cache: ResultCache,
    oracle: O,
}

impl<O: Oracle> Pipeline<O> {
    pub fn new(prompts: PromptLibrary, cache: ResultCache, oracle: O) -> Self {
        Self {
            prompts,
            cache,
            oracle,
        }
    }

    pub fn from_config(config: &PipelineConfig, oracle: O) -> Self {
        Self::new(
            PromptLibrary::new(config.prompt_dirs.clone()),
            ResultCache::new(config.cache_dir.clone()),
            oracle,
        )
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Execute every stage `request` needs, each exactly once.
    pub fn run(&self, corpus: &Corpus, request: &RunRequest) -> Result<RunReport, PipelineError> {
        if request.is_empty() {
            return Err(PipelineError::NothingRequested);
        }

        let plan = request.plan();
        tracing::info!(
            corpus = corpus.identity(),
            plan = %plan.iter().map(ToString::to_string).collect::<Vec<_>>().join(" → "),
            "resolved stage plan"
        );

        let mut report = RunReport {
            request: request.clone(),
            plan: plan.clone(),
            ..RunReport::default()
        };

        for node in plan {
            match node {
                StageNode::Categorize => {
                    report.categories = Some(self.categorize(corpus, request.force_refresh)?);
                }
                StageNode::Analyze(mode) => {
                    let text = self.analyze(corpus, mode, report.categories.as_ref())?;
                    report.analyses.insert(mode, text);
                }
                StageNode::Cleanup => {
                    let analysis = report.analyses.get(&AnalysisMode::Long).map(String::as_str);
                    report.cleaned =
                        Some(self.cleanup(corpus, report.categories.as_ref(), analysis)?);
                }
                StageNode::Format(output) => {
                    let cleaned = match report.cleaned.as_deref() {
                        Some(cleaned) => cleaned.to_string(),
                        None => self.cleanup(corpus, report.categories.as_ref(), None)?,
                    };
                    let filtered = report.categories.as_ref().map(filter);
                    report.output =
                        Some(self.format(corpus, &cleaned, output, filtered.as_ref())?);
                }
            }
        }

        Ok(report)
    }

    /// Cached categorization unless `force_refresh`; otherwise ask the model
    /// and overwrite the cache record.
    pub fn categorize(
        &self,
        corpus: &Corpus,
        force_refresh: bool,
    ) -> Result<CategoricalStructure, PipelineError> {
        if !force_refresh {
            match self.cache.get(corpus.identity()) {
                Some(cached) if !cached.is_empty() => {
                    tracing::info!(corpus = corpus.identity(), "using cached categorization");
                    return Ok(cached);
                }
                Some(_) => {
                    tracing::debug!(corpus = corpus.identity(), "cached categorization is empty; recomputing");
                }
                None => {}
            }
        }

        tracing::info!(corpus = corpus.identity(), force_refresh, "categorizing");
        let user = format!(
            "{FILENAME_PREFIX}{}\n\n{CORPUS_CONTENT_HEADER}\n{}",
            corpus.file_name(),
            corpus.content()
        );
        let response = self.ask(prompts::CATEGORIZE, &user)?;
        let categories = parse(&response);
        if categories.is_degenerate() {
            tracing::warn!(
                corpus = corpus.identity(),
                "model output was not structured; keeping it as raw_response"
            );
        }

        match self.cache.put(corpus.identity(), &categories) {
            Ok(path) => tracing::debug!(path = %path.display(), "cached categorization"),
            Err(e) => tracing::warn!(error = %e, "could not save categorization cache"),
        }
        Ok(categories)
    }

    pub fn analyze(
        &self,
        corpus: &Corpus,
        mode: AnalysisMode,
        categories: Option<&CategoricalStructure>,
    ) -> Result<String, PipelineError> {
        let categories = match categories {
            Some(c) => filter(c),
            None => filter(&self.categorize(corpus, false)?),
        };

        tracing::info!(corpus = corpus.identity(), %mode, "analyzing");
        let user = format!(
            "{FILENAME_PREFIX}{}\n{MODE_PREFIX}{mode}\n\n{CATEGORIES_HEADER}{}\n\n{CORPUS_CONTENT_HEADER}{}",
            corpus.file_name(),
            categories.prompt_text(),
            corpus.content()
        );
        self.ask(prompts::ANALYZE, &user)
    }

    /// Reconstruct the corpus. Runs a long analysis first if none is given.
    pub fn cleanup(
        &self,
        corpus: &Corpus,
        categories: Option<&CategoricalStructure>,
        analysis: Option<&str>,
    ) -> Result<String, PipelineError> {
        let categories = match categories {
            Some(c) => filter(c),
            None => filter(&self.categorize(corpus, false)?),
        };
        let analysis = match analysis {
            Some(a) => a.to_string(),
            None => self.analyze(corpus, AnalysisMode::Long, Some(&categories))?,
        };

        tracing::info!(corpus = corpus.identity(), "cleaning up");
        let user = format!(
            "{FILENAME_PREFIX}{}\n\n{CATEGORIES_HEADER}{}\n\n{ANALYSIS_HEADER}{}\n\n{ORIGINAL_CONTENT_HEADER}{}",
            corpus.file_name(),
            categories.prompt_text(),
            analysis,
            corpus.content()
        );
        self.ask(prompts::CLEANUP, &user)
    }

    /// `Text` passes `cleaned` through; `Yaml` asks the model to restructure it.
    pub fn format(
        &self,
        corpus: &Corpus,
        cleaned: &str,
        output: OutputFormat,
        categories: Option<&CategoricalStructure>,
    ) -> Result<String, PipelineError> {
        match output {
            OutputFormat::Text => Ok(cleaned.to_string()),
            OutputFormat::Yaml => {
                tracing::info!(corpus = corpus.identity(), "formatting as yaml");
                let categories = categories.cloned().unwrap_or_default();
                let user = format!(
                    "{FILENAME_PREFIX}{}\n{OUTPUT_FORMAT_PREFIX}{output}\n\n{CATEGORIES_HEADER}{}\n\n{CLEANED_CONTENT_HEADER}{}",
                    corpus.file_name(),
                    categories.prompt_text(),
                    cleaned
                );
                self.ask(prompts::OUTPUT, &user)
            }
        }
    }

    fn ask(&self, stage_prompt: &str, user: &str) -> Result<String, PipelineError> {
        let system = self
            .prompts
            .compose(&[prompts::GUIDE, prompts::INTRO, stage_prompt])?;
        let response = self.oracle.complete(&system, user)?;
        if response.trim().is_empty() {
            return Err(OracleError::EmptyResponse {
                backend: self.oracle.name().to_string(),
            }
            .into());
        }
        Ok(response)
    }
}
