//! HTTP backends for the oracle.
//!
//! All backends are blocking: a pipeline run is a straight line of model
//! calls and each stage needs the previous answer before it can start.
//!
//! Credentials and endpoints come from the environment (recommended):
//! - OpenAI: `OPENAI_API_KEY`, `OPENAI_BASE_URL` (default `https://api.openai.com`)
//! - Anthropic: `ANTHROPIC_API_KEY`, `ANTHROPIC_BASE_URL`, `ANTHROPIC_VERSION`
//! - Ollama: `OLLAMA_HOST` (default `http://127.0.0.1:11434`)
//! - OpenRouter: `OPENROUTER_API_KEY`, `OPENROUTER_BASE_URL`,
//!   optional `OPENROUTER_REFERER` / `OPENROUTER_TITLE` attribution headers

#![allow(unused_imports)]

use serde_json::json;
use std::fmt;
use std::time::Duration;

use super::offline::OfflineOracle;
use super::{Oracle, OracleError};
use crate::config::{self, ConfigError, ReasoningEffort};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const ANTHROPIC_VERSION_ENV: &str = "ANTHROPIC_VERSION";
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const OPENROUTER_BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";
pub const OPENROUTER_REFERER_ENV: &str = "OPENROUTER_REFERER";
pub const OPENROUTER_TITLE_ENV: &str = "OPENROUTER_TITLE";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAI,
    Anthropic,
    Ollama,
    OpenRouter,
    /// Deterministic, network-free answers derived from the corpus.
    Offline,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
            Self::Offline => "mock",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-5",
            Self::Anthropic => "claude-sonnet-4-5",
            Self::Ollama => "llama3.1",
            Self::OpenRouter => "openai/gpt-5",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "openrouter" => Ok(Self::OpenRouter),
            "mock" | "offline" => Ok(Self::Offline),
            other => Err(format!(
                "unknown backend `{other}` (expected openai|anthropic|ollama|openrouter|mock)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub backend: BackendKind,
    pub model: String,
    pub timeout: Option<Duration>,
    pub max_output_tokens: u32,
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl OracleSettings {
    /// Resolve settings from explicit overrides, then `WCT_LLM_*` env vars.
    pub fn resolve(
        backend: Option<BackendKind>,
        model: Option<String>,
        timeout_secs: Option<u64>,
        reasoning_effort: Option<ReasoningEffort>,
    ) -> Result<Self, ConfigError> {
        let backend = match backend {
            Some(b) => b,
            None => {
                let raw = config::env_value(config::WCT_LLM_BACKEND_ENV)?
                    .unwrap_or_else(|| config::DEFAULT_LLM_BACKEND.to_string());
                raw.parse::<BackendKind>()
                    .map_err(|_| ConfigError::Invalid {
                        name: config::WCT_LLM_BACKEND_ENV.to_string(),
                        value: raw.clone(),
                        expected: "openai|anthropic|ollama|openrouter|mock",
                    })?
            }
        };
        let model = match model.filter(|m| !m.trim().is_empty()) {
            Some(m) => m,
            None => config::env_value(config::WCT_LLM_MODEL_ENV)?
                .unwrap_or_else(|| backend.default_model().to_string()),
        };
        Ok(Self {
            backend,
            model,
            timeout: config::llm_timeout(timeout_secs)?,
            max_output_tokens: config::llm_max_output_tokens()?,
            reasoning_effort: config::llm_reasoning_effort(reasoning_effort)?,
        })
    }
}

/// Picks the oracle implementation for `settings`.
pub fn build_oracle(settings: OracleSettings) -> Box<dyn Oracle> {
    match settings.backend {
        BackendKind::Offline => Box::new(OfflineOracle::new()),
        _ => Box::new(LlmOracle::new(settings)),
    }
}

pub struct LlmOracle {
    settings: OracleSettings,
    label: String,
}

impl LlmOracle {
    pub fn new(settings: OracleSettings) -> Self {
        let label = format!("{}:{}", settings.backend, settings.model);
        Self { settings, label }
    }

    pub fn settings(&self) -> &OracleSettings {
        &self.settings
    }

    fn dispatch(&self, system: &str, user: &str) -> Result<Option<String>, OracleError> {
        let s = &self.settings;
        match s.backend {
            #[cfg(feature = "llm-openai")]
            BackendKind::OpenAI => openai_responses(s, system, user),
            #[cfg(feature = "llm-anthropic")]
            BackendKind::Anthropic => anthropic_messages(s, system, user),
            #[cfg(feature = "llm-ollama")]
            BackendKind::Ollama => ollama_chat(s, system, user),
            #[cfg(feature = "llm-openrouter")]
            BackendKind::OpenRouter => openrouter_chat(s, system, user),
            BackendKind::Offline => OfflineOracle::new().complete(system, user).map(Some),
            #[allow(unreachable_patterns)]
            other => Err(OracleError::Unavailable(format!(
                "backend `{other}` is not compiled in (enable the `llm-{other}` feature)"
            ))),
        }
    }
}

impl Oracle for LlmOracle {
    fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        tracing::debug!(
            backend = %self.settings.backend,
            model = %self.settings.model,
            system_chars = system.len(),
            user_chars = user.len(),
            "calling model"
        );
        match self.dispatch(system, user)? {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(OracleError::EmptyResponse {
                backend: self.label.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

// =============================================================================
// Shared HTTP plumbing
// =============================================================================

#[cfg(any(
    feature = "llm-openai",
    feature = "llm-anthropic",
    feature = "llm-ollama",
    feature = "llm-openrouter"
))]
fn normalize_http_base_url(base_url: &str, default: &str) -> String {
    let mut host = base_url.trim().to_string();
    if host.is_empty() {
        host = default.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("https://{host}");
    }
    host.trim_end_matches('/').to_string()
}

#[cfg(any(
    feature = "llm-openai",
    feature = "llm-anthropic",
    feature = "llm-ollama",
    feature = "llm-openrouter"
))]
fn http_client(timeout: Option<Duration>) -> Result<reqwest::blocking::Client, OracleError> {
    let mut builder = reqwest::blocking::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| OracleError::Unavailable(format!("failed to build http client: {e}")))
}

#[cfg(any(
    feature = "llm-openai",
    feature = "llm-anthropic",
    feature = "llm-openrouter"
))]
fn api_key(env: &str, backend: &str) -> Result<String, OracleError> {
    let key = std::env::var(env).unwrap_or_default().trim().to_string();
    if key.is_empty() {
        return Err(OracleError::Unavailable(format!(
            "{backend} backend requires {env} (set it in your env; do not hardcode secrets in scripts)"
        )));
    }
    Ok(key)
}

#[cfg(any(
    feature = "llm-openai",
    feature = "llm-anthropic",
    feature = "llm-ollama",
    feature = "llm-openrouter"
))]
fn read_json(
    resp: reqwest::blocking::Response,
    backend: &str,
) -> Result<serde_json::Value, OracleError> {
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        return Err(OracleError::Unavailable(format!(
            "{backend} http error {status}: {text}"
        )));
    }
    resp.json()
        .map_err(|e| OracleError::Unavailable(format!("{backend} returned invalid JSON: {e}")))
}

/// Joins text chunks, skipping blanks; `None` when nothing is left.
fn join_text<'a>(chunks: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut out = String::new();
    for t in chunks {
        if t.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(t);
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// =============================================================================
// OpenAI backend (Responses API)
// =============================================================================

fn openai_extract_output_text(v: &serde_json::Value) -> Option<String> {
    let output = v.get("output")?.as_array()?;
    // The Responses API emits many item types; only "message" carries text.
    let texts = output
        .iter()
        .filter(|item| item.get("type").and_then(|x| x.as_str()) == Some("message"))
        .filter_map(|item| item.get("content").and_then(|x| x.as_array()))
        .flatten()
        .filter(|c| c.get("type").and_then(|x| x.as_str()) == Some("output_text"))
        .filter_map(|c| c.get("text").and_then(|x| x.as_str()));
    join_text(texts)
}

#[cfg(feature = "llm-openai")]
fn openai_responses(
    settings: &OracleSettings,
    system: &str,
    user: &str,
) -> Result<Option<String>, OracleError> {
    let key = api_key(OPENAI_API_KEY_ENV, "OpenAI")?;
    let base_url = normalize_http_base_url(
        &std::env::var(OPENAI_BASE_URL_ENV).unwrap_or_default(),
        DEFAULT_OPENAI_BASE_URL,
    );
    let url = format!("{base_url}/v1/responses");

    let mut body = json!({
        "model": settings.model,
        "instructions": system,
        "input": user,
        "max_output_tokens": settings.max_output_tokens,
    });
    if let Some(effort) = settings.reasoning_effort {
        body["reasoning"] = json!({ "effort": effort.as_str() });
    }

    let client = http_client(settings.timeout)?;
    let resp = client
        .post(&url)
        .bearer_auth(key)
        .json(&body)
        .send()
        .map_err(|e| OracleError::Unavailable(format!("failed to reach OpenAI at {url}: {e}")))?;
    let v = read_json(resp, "openai")?;
    Ok(openai_extract_output_text(&v))
}

// =============================================================================
// Anthropic backend (Messages API)
// =============================================================================

fn anthropic_extract_output_text(v: &serde_json::Value) -> Option<String> {
    let blocks = v.get("content")?.as_array()?;
    let texts = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|x| x.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|x| x.as_str()));
    join_text(texts)
}

#[cfg(feature = "llm-anthropic")]
fn anthropic_messages(
    settings: &OracleSettings,
    system: &str,
    user: &str,
) -> Result<Option<String>, OracleError> {
    let key = api_key(ANTHROPIC_API_KEY_ENV, "Anthropic")?;
    let base_url = normalize_http_base_url(
        &std::env::var(ANTHROPIC_BASE_URL_ENV).unwrap_or_default(),
        DEFAULT_ANTHROPIC_BASE_URL,
    );
    let url = format!("{base_url}/v1/messages");
    let version = std::env::var(ANTHROPIC_VERSION_ENV)
        .unwrap_or_else(|_| DEFAULT_ANTHROPIC_VERSION.to_string());

    let body = json!({
        "model": settings.model,
        "max_tokens": settings.max_output_tokens,
        "system": system,
        "messages": [
            { "role": "user", "content": user }
        ]
    });

    let client = http_client(settings.timeout)?;
    let resp = client
        .post(&url)
        .header("x-api-key", key)
        .header("anthropic-version", version)
        .json(&body)
        .send()
        .map_err(|e| {
            OracleError::Unavailable(format!("failed to reach Anthropic at {url}: {e}"))
        })?;
    let v = read_json(resp, "anthropic")?;
    Ok(anthropic_extract_output_text(&v))
}

// =============================================================================
// Ollama backend (native /api/chat)
// =============================================================================

#[cfg(feature = "llm-ollama")]
fn ollama_chat(
    settings: &OracleSettings,
    system: &str,
    user: &str,
) -> Result<Option<String>, OracleError> {
    // Prefer IPv4 loopback: `localhost` may resolve to ::1 where Ollama is
    // not listening.
    let host = std::env::var(OLLAMA_HOST_ENV).unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let mut host = host.trim().to_string();
    if host.is_empty() {
        host = DEFAULT_OLLAMA_HOST.to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        host = format!("http://{host}");
    }
    let url = format!("{}/api/chat", host.trim_end_matches('/'));

    let body = json!({
        "model": settings.model,
        "stream": false,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user }
        ],
        "options": {
            "num_predict": settings.max_output_tokens
        }
    });

    let client = http_client(settings.timeout)?;
    let resp = client.post(&url).json(&body).send().map_err(|e| {
        OracleError::Unavailable(format!(
            "failed to reach ollama at {url} (is it running?) ({e}). Try: `ollama serve` or set {OLLAMA_HOST_ENV}"
        ))
    })?;
    let v = read_json(resp, "ollama")?;
    let text = v
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str());
    Ok(join_text(text))
}

// =============================================================================
// OpenRouter backend (chat completions)
// =============================================================================

/// `content` is either a string or a list of typed parts.
fn openrouter_extract_message_text(v: &serde_json::Value) -> Option<String> {
    let message = v.get("choices")?.as_array()?.first()?.get("message")?;
    match message.get("content")? {
        serde_json::Value::String(s) => join_text([s.as_str()]),
        serde_json::Value::Array(parts) => join_text(
            parts
                .iter()
                .filter(|p| p.get("type").and_then(|x| x.as_str()) == Some("text"))
                .filter_map(|p| p.get("text").and_then(|x| x.as_str())),
        ),
        _ => None,
    }
}

#[cfg(feature = "llm-openrouter")]
fn openrouter_chat(
    settings: &OracleSettings,
    system: &str,
    user: &str,
) -> Result<Option<String>, OracleError> {
    let key = api_key(OPENROUTER_API_KEY_ENV, "OpenRouter")?;
    let base_url = normalize_http_base_url(
        &std::env::var(OPENROUTER_BASE_URL_ENV).unwrap_or_default(),
        DEFAULT_OPENROUTER_BASE_URL,
    );
    let url = format!("{base_url}/chat/completions");

    let body = json!({
        "model": settings.model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user }
        ],
        "temperature": 0.0,
        "max_tokens": settings.max_output_tokens
    });

    let client = http_client(settings.timeout)?;
    let mut req = client.post(&url).bearer_auth(key).json(&body);
    if let Ok(referer) = std::env::var(OPENROUTER_REFERER_ENV) {
        req = req.header("HTTP-Referer", referer);
    }
    if let Ok(title) = std::env::var(OPENROUTER_TITLE_ENV) {
        req = req.header("X-Title", title);
    }
    let resp = req.send().map_err(|e| {
        OracleError::Unavailable(format!("OpenRouter network error at {url}: {e}"))
    })?;
    let v = read_json(resp, "openrouter")?;
    Ok(openrouter_extract_message_text(&v))
}
