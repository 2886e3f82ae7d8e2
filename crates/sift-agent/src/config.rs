//! Configuration loading
//!
//! A single `sift.yaml` configures the app identity, the model provider,
//! and runtime limits. Loaded once at process start; every field has a
//! default so an empty file is a valid configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct SiftConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            provider: ProviderConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl SiftConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SiftConfig = serde_yaml::from_str(content)?;
        validate_config(&config)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_env(),
        }
    }
}

fn default_app_name() -> String {
    "sift".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

/// Model provider settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key; the key itself never
    /// appears in config files.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_model() -> String {
    "openai/gpt-oss-20b".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Hard per-run step budget.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    100
}

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<SiftConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    SiftConfig::from_yaml_str(&content)
}

fn validate_config(config: &SiftConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }
    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }
    if config.provider.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "provider.endpoint must not be empty".to_string(),
        ));
    }
    if config.provider.model.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "provider.model must not be empty".to_string(),
        ));
    }
    if !(0.0..=2.0).contains(&config.provider.temperature) {
        return Err(ConfigError::Invalid(
            "provider.temperature must be between 0 and 2".to_string(),
        ));
    }
    if config.runtime.max_steps == 0 {
        return Err(ConfigError::Invalid(
            "runtime.max_steps must be > 0".to_string(),
        ));
    }
    Ok(())
}
