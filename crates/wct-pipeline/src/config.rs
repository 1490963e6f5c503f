//! Configuration resolution.
//!
//! Every setting follows the same precedence:
//! 1) explicit override (usually a CLI flag)
//! 2) environment variable
//! 3) built-in default
//!
//! Empty environment variables count as unset.

use std::path::PathBuf;
use std::time::Duration;

pub const WCT_PROMPTS_DIR_ENV: &str = "WCT_PROMPTS_DIR";
pub const WCT_CACHE_DIR_ENV: &str = "WCT_CACHE_DIR";
pub const WCT_LLM_BACKEND_ENV: &str = "WCT_LLM_BACKEND";
pub const WCT_LLM_MODEL_ENV: &str = "WCT_LLM_MODEL";
pub const WCT_LLM_TIMEOUT_SECS_ENV: &str = "WCT_LLM_TIMEOUT_SECS";
pub const WCT_LLM_MAX_OUTPUT_TOKENS_ENV: &str = "WCT_LLM_MAX_OUTPUT_TOKENS";
pub const WCT_LLM_REASONING_EFFORT_ENV: &str = "WCT_LLM_REASONING_EFFORT";

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_CACHE_DIR: &str = ".wct_cache";
pub const DEFAULT_LLM_BACKEND: &str = "openai";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_MAX_OUTPUT_TOKENS: u32 = 10_000;
const MAX_LLM_OUTPUT_TOKENS: u32 = 64_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}={value:?} (expected {expected})")]
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read {name}: {source}")]
    Env {
        name: String,
        #[source]
        source: std::env::VarError,
    },
}

/// Where the pipeline finds prompts and keeps its cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub prompt_dirs: Vec<PathBuf>,
    pub cache_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_dirs: vec![PathBuf::from(DEFAULT_PROMPTS_DIR)],
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl PipelineConfig {
    pub fn resolve(
        prompt_dirs: Vec<PathBuf>,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let prompt_dirs = if !prompt_dirs.is_empty() {
            prompt_dirs
        } else {
            match env_value(WCT_PROMPTS_DIR_ENV)? {
                Some(v) => std::env::split_paths(&v).collect(),
                None => defaults.prompt_dirs,
            }
        };

        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => env_value(WCT_CACHE_DIR_ENV)?
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        };

        Ok(Self {
            prompt_dirs,
            cache_dir,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown reasoning effort `{other}`")),
        }
    }
}

/// Trimmed value of `name`, or `None` when unset or blank.
pub(crate) fn env_value(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            Ok(if v.is_empty() { None } else { Some(v.to_string()) })
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(ConfigError::Env {
            name: name.to_string(),
            source,
        }),
    }
}

/// `0` disables the timeout.
pub fn llm_timeout(override_secs: Option<u64>) -> Result<Option<Duration>, ConfigError> {
    let secs = match override_secs {
        Some(secs) => secs,
        None => parse_timeout_secs(env_value(WCT_LLM_TIMEOUT_SECS_ENV)?.as_deref())?,
    };
    Ok(if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    })
}

fn parse_timeout_secs(raw: Option<&str>) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(DEFAULT_LLM_TIMEOUT_SECS),
        Some(v) => v.parse::<u64>().map_err(|_| ConfigError::Invalid {
            name: WCT_LLM_TIMEOUT_SECS_ENV.to_string(),
            value: v.to_string(),
            expected: "integer seconds; 0 disables",
        }),
    }
}

pub fn llm_max_output_tokens() -> Result<u32, ConfigError> {
    parse_max_output_tokens(env_value(WCT_LLM_MAX_OUTPUT_TOKENS_ENV)?.as_deref())
}

fn parse_max_output_tokens(raw: Option<&str>) -> Result<u32, ConfigError> {
    let Some(v) = raw else {
        return Ok(DEFAULT_LLM_MAX_OUTPUT_TOKENS);
    };
    let parsed = v.parse::<u32>().map_err(|_| ConfigError::Invalid {
        name: WCT_LLM_MAX_OUTPUT_TOKENS_ENV.to_string(),
        value: v.to_string(),
        expected: "integer tokens, e.g. 10000",
    })?;
    if parsed == 0 {
        Ok(DEFAULT_LLM_MAX_OUTPUT_TOKENS)
    } else {
        Ok(parsed.min(MAX_LLM_OUTPUT_TOKENS))
    }
}

/// `None` means "do not send a reasoning hint".
pub fn llm_reasoning_effort(
    override_effort: Option<ReasoningEffort>,
) -> Result<Option<ReasoningEffort>, ConfigError> {
    if override_effort.is_some() {
        return Ok(override_effort);
    }
    parse_reasoning_effort(env_value(WCT_LLM_REASONING_EFFORT_ENV)?.as_deref())
}

fn parse_reasoning_effort(raw: Option<&str>) -> Result<Option<ReasoningEffort>, ConfigError> {
    let Some(v) = raw else {
        return Ok(Some(ReasoningEffort::Medium));
    };
    match v.to_ascii_lowercase().as_str() {
        "0" | "false" | "none" => Ok(None),
        other => other
            .parse::<ReasoningEffort>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name: WCT_LLM_REASONING_EFFORT_ENV.to_string(),
                value: v.to_string(),
                expected: "low|medium|high|none",
            }),
    }
}
