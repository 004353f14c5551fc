//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `TAPESTRY_WORK_DIR`, `TAPESTRY_LOG_LEVEL` and `TAPESTRY_BIND`
//! env overrides.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// HTTP surface configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Socket address to bind the HTTP listener to.
    pub bind: String,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body. Must support structured output.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Dummy provider configuration (`[llm.dummy]`).
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Canned reply returned for every request. `None` echoes the input.
    pub reply: Option<String>,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `provider` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
    pub dummy: DummyConfig,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub http: HttpConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var, `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    /// SQLite project database (absolute, or resolved against `work_dir`).
    pub db_path: PathBuf,
    /// Directory holding prompt templates.
    pub prompts_dir: PathBuf,
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    server: RawServer,
    #[serde(default)]
    http: RawHttp,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    prompts: RawPrompts,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_name")]
    name: String,
    work_dir: String,
    log_level: String,
}

#[derive(Deserialize)]
struct RawHttp {
    #[serde(default = "default_http_bind")]
    bind: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self { bind: default_http_bind() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// `provider = "..."` in `[llm]`; the older `default` key is still read.
    #[serde(alias = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
    #[serde(default)]
    dummy: RawDummyConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            openai: RawOpenAiConfig::default(),
            dummy: RawDummyConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawDummyConfig {
    #[serde(default)]
    reply: Option<String>,
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_db_file")]
    db_file: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { db_file: default_db_file() }
    }
}

#[derive(Deserialize)]
struct RawPrompts {
    #[serde(default = "default_prompts_dir")]
    dir: String,
}

impl Default for RawPrompts {
    fn default() -> Self {
        Self { dir: default_prompts_dir() }
    }
}

fn default_name() -> String { "tapestry".to_string() }
fn default_http_bind() -> String { "127.0.0.1:3000".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o".to_string() }
fn default_openai_temperature() -> f32 { 0.0 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_db_file() -> String { "tapestry.db".to_string() }
fn default_prompts_dir() -> String { "config/prompts".to_string() }

/// Env-sourced overrides, collected separately so tests never mutate env.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub bind: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("TAPESTRY_WORK_DIR").ok(),
            log_level: env::var("TAPESTRY_LOG_LEVEL").ok(),
            bind: env::var("TAPESTRY_BIND").ok(),
        }
    }
}

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    load_from(Path::new("config/default.toml"), &Overrides::from_env())
}

/// Internal loader. Accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.server;

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    logger::validate_level(&log_level)?;
    let bind = overrides.bind.clone().unwrap_or(parsed.http.bind);

    let db_path = {
        let p = expand_home(&parsed.store.db_file);
        if p.is_absolute() { p } else { work_dir.join(p) }
    };

    Ok(Config {
        name: s.name,
        work_dir,
        log_level,
        http: HttpConfig { bind },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
            dummy: DummyConfig { reply: parsed.llm.dummy.reply },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        db_path,
        prompts_dir: expand_home(&parsed.prompts.dir),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for tests: dummy LLM and no API key.
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            http: HttpConfig { bind: "127.0.0.1:0".into() },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
                dummy: DummyConfig { reply: None },
            },
            llm_api_key: None,
            db_path: work_dir.join("tapestry.db"),
            prompts_dir: work_dir.join("prompts"),
        }
    }
}
