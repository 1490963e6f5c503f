//! WCT CLI
//!
//! Runs a wildcard file through categorization, analysis and cleanup:
//!
//! ```text
//! wct poses.txt --categorize
//! wct poses.txt --analyze short
//! wct poses.txt --cleanup --output yaml --save-to poses.cleaned.yaml
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wct_pipeline::config::ReasoningEffort;
use wct_pipeline::oracle::{build_oracle, BackendKind, OracleSettings};
use wct_pipeline::{AnalysisMode, Corpus, OutputFormat, Pipeline, PipelineConfig, RunRequest};

#[derive(Parser)]
#[command(name = "wct")]
#[command(
    author,
    version,
    about = "Wildcard cleanup tool: categorize, analyze and clean up wildcard files"
)]
struct Cli {
    /// Wildcard file (one entry per line)
    input: PathBuf,

    /// Print the inferred categories (cached per file)
    #[arg(long)]
    categorize: bool,

    /// Analyze the file (`short` summary or `long` report)
    #[arg(long, value_name = "MODE")]
    analyze: Option<AnalysisMode>,

    /// Produce a cleaned version of the file
    #[arg(long)]
    cleanup: bool,

    /// Format of the cleaned output
    #[arg(long, value_name = "FORMAT", default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Ignore the categorization cache and recompute it
    #[arg(long)]
    force_refresh: bool,

    /// Write the report to this file instead of stdout. The confirmation
    /// line goes to stderr, so stdout stays empty.
    #[arg(long, value_name = "PATH")]
    save_to: Option<PathBuf>,

    /// Reasoning effort hint for models that support it (`WCT_LLM_REASONING_EFFORT`)
    #[arg(long, value_name = "EFFORT")]
    reasoning_effort: Option<ReasoningEffort>,

    /// openai | anthropic | ollama | openrouter | mock (`WCT_LLM_BACKEND`)
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Model name; defaults per backend (`WCT_LLM_MODEL`)
    #[arg(long)]
    model: Option<String>,

    /// Prompt directory; repeat to search several, first hit wins (`WCT_PROMPTS_DIR`)
    #[arg(long = "prompts-dir", value_name = "DIR")]
    prompts_dirs: Vec<PathBuf>,

    /// Categorization cache directory (`WCT_CACHE_DIR`)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Per-request timeout; 0 disables (`WCT_LLM_TIMEOUT_SECS`)
    #[arg(long, value_name = "N")]
    timeout_secs: Option<u64>,

    /// Debug logging for wct (overridden by `RUST_LOG`)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn request(&self) -> RunRequest {
        RunRequest {
            categorize: self.categorize,
            analyze: self.analyze,
            cleanup: self.cleanup,
            output: self.output,
            force_refresh: self.force_refresh,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "warn,wct_cli=debug,wct_pipeline=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.input.is_file() {
        return Err(anyhow!("input file '{}' not found", cli.input.display()));
    }

    let request = cli.request();
    if request.is_empty() {
        bail!("nothing to do: pass at least one of --categorize, --analyze or --cleanup");
    }

    let config = PipelineConfig::resolve(cli.prompts_dirs.clone(), cli.cache_dir.clone())?;
    let settings = OracleSettings::resolve(
        cli.backend,
        cli.model.clone(),
        cli.timeout_secs,
        cli.reasoning_effort,
    )?;
    tracing::debug!(
        backend = %settings.backend,
        model = %settings.model,
        prompts = ?config.prompt_dirs,
        cache = %config.cache_dir.display(),
        "resolved configuration"
    );

    let corpus = Corpus::load(&cli.input)?;
    let pipeline = Pipeline::from_config(&config, build_oracle(settings));
    let report = pipeline.run(&corpus, &request)?;
    let rendered = report.render();

    match &cli.save_to {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "{} {}",
                "saved results to".green().bold(),
                path.display().to_string().bold()
            );
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
