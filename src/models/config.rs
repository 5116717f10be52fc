//! Configuration models for doxa.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for doxa.
///
/// I^R resolved: All configurable parameters are explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenRouter API configuration (world sampling endpoint)
    pub openrouter: OpenRouterConfig,

    /// Metaculus API configuration (question source and submission)
    pub metaculus: MetaculusConfig,

    /// World sampling configuration
    pub worlds: WorldsConfig,

    /// Run settings
    #[serde(default)]
    pub run: RunConfig,
}

/// OpenRouter API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key (can also be set via the env var named by `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_openrouter_api_key_env")]
    pub api_key_env: String,

    /// Base URL for OpenRouter API
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_openrouter_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_timeout() -> u64 {
    90
}

fn default_max_retries() -> u32 {
    4
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openrouter_api_key_env(),
            base_url: default_openrouter_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Metaculus API configuration.
///
/// K_i: The tournament slug is pinned in config, not guessed from the
/// environment, so a stray env var cannot redirect a production run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaculusConfig {
    /// API token (can also be set via the env var named by `token_env`)
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable name for the API token
    #[serde(default = "default_metaculus_token_env")]
    pub token_env: String,

    /// Base URL for the Metaculus API
    #[serde(default = "default_metaculus_base_url")]
    pub base_url: String,

    /// Tournament slug to fetch open questions from
    pub tournament: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_metaculus_token_env() -> String {
    "METACULUS_TOKEN".to_string()
}

fn default_metaculus_base_url() -> String {
    "https://www.metaculus.com/api".to_string()
}

/// World sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldsConfig {
    /// Independent world draws per question
    #[serde(default = "default_n_worlds")]
    pub n_worlds: usize,

    /// Max concurrent draws (bounded fan-out)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Models to draw worlds from
    pub models: Vec<ModelSpec>,
}

fn default_n_worlds() -> usize {
    30
}

fn default_pool_size() -> usize {
    8
}

/// Specification for a sampling model.
///
/// K_i: Model ID format is "provider/model" (e.g. "openai/gpt-4o-mini").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model ID
    pub id: String,

    /// Selection weight (higher = more draws routed to this model)
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Input price per 1M tokens (USD)
    #[serde(default)]
    pub input_price_per_1m: f64,

    /// Output price per 1M tokens (USD)
    #[serde(default)]
    pub output_price_per_1m: f64,

    /// Maximum tokens for a world reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_weight() -> u32 {
    1
}

fn default_max_tokens() -> u32 {
    800
}

fn default_temperature() -> f64 {
    0.7
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Path to the posted-id ledger store
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Re-forecast questions already recorded in the ledger.
    /// The ledger is still updated after each successful submission.
    #[serde(default)]
    pub force: bool,

    /// Submit forecasts (false = dry run: aggregate and validate only)
    #[serde(default = "default_true")]
    pub submit: bool,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("posted.json")
}

fn default_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            force: false,
            submit: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Resolve the OpenRouter API key from config or environment.
    ///
    /// B_i(api key available) → Result
    pub fn resolve_openrouter_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.openrouter.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.openrouter.api_key_env).map_err(|_| ConfigError::MissingKey {
            what: "OpenRouter API key".to_string(),
            env_var: self.openrouter.api_key_env.clone(),
        })
    }

    /// Resolve the Metaculus token from config or environment.
    pub fn resolve_metaculus_token(&self) -> Result<String, ConfigError> {
        if let Some(token) = &self.metaculus.token {
            return Ok(expand_env_vars(token));
        }

        std::env::var(&self.metaculus.token_env).map_err(|_| ConfigError::MissingKey {
            what: "Metaculus token".to_string(),
            env_var: self.metaculus.token_env.clone(),
        })
    }

    /// Validate that sampling is actually configured.
    pub fn validate_models(&self) -> Result<(), ConfigError> {
        if self.worlds.models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if self.worlds.n_worlds == 0 {
            return Err(ConfigError::NoWorlds);
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax. If the variable is not set, the
/// placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error
/// - I^B materialized: Missing required values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing {what}: set {env_var} env var or the key in config")]
    MissingKey { what: String, env_var: String },

    #[error("No sampling models configured in [worlds]")]
    NoModels,

    #[error("[worlds].n_worlds must be at least 1")]
    NoWorlds,
}
