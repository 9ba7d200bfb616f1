//! Configuration loading, validation, and management for Slo.
//!
//! Loads configuration from `~/.slo/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use slo_core::AgentPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.slo/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-turn agent limits
    #[serde(default)]
    pub agent: AgentPolicy,

    /// Per-user rate limit on agent turns
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Conversation history persistence
    #[serde(default)]
    pub history: HistoryConfig,

    /// Where journals, tasks and chat history live
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Anthropic API key. Keys not starting with `sk-` count as missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-3-haiku-20240307".into()
}
fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1200
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_calls() -> usize {
    60
}
fn default_window_secs() -> u64 {
    60
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of prior turns replayed to the model
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_true() -> bool {
    true
}
fn default_history_limit() -> usize {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// SQLite database file. Defaults to `~/.slo/slo.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("slo.db"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.slo/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ANTHROPIC_API_KEY`
    /// - `CLAUDE_MODEL`
    /// - `ANTHROPIC_BASE`
    /// - `SLO_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()) {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = lookup("CLAUDE_MODEL").filter(|m| !m.is_empty()) {
            self.provider.model = model;
        }
        if let Some(base) = lookup("ANTHROPIC_BASE").filter(|b| !b.is_empty()) {
            self.provider.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("SLO_DB_PATH").filter(|p| !p.is_empty()) {
            self.storage.path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".slo")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.provider.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "provider.max_tokens must be > 0".into(),
            ));
        }

        if self.rate_limit.max_calls == 0 || self.rate_limit.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.max_calls and rate_limit.window_secs must be > 0".into(),
            ));
        }

        if self.history.limit < 2 {
            return Err(ConfigError::ValidationError(
                "history.limit must be at least 2".into(),
            ));
        }

        self.agent
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("agent: {e}")))?;

        Ok(())
    }

    /// Whether a usable Anthropic key is configured.
    pub fn has_api_key(&self) -> bool {
        self.provider
            .api_key
            .as_deref()
            .is_some_and(|k| k.starts_with("sk-"))
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider.model, "claude-3-haiku-20240307");
        assert_eq!(config.provider.max_tokens, 1200);
        assert_eq!(config.rate_limit.max_calls, 60);
        assert_eq!(config.history.limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.agent, config.agent);
    }

    #[test]
    fn invalid_policy_rejected() {
        let config = AppConfig {
            agent: AgentPolicy {
                max_tool_calls: 12,
                max_writes_per_turn: 3,
                require_confirm_threshold: 4,
            },
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("require_confirm_threshold"));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn history_limit_below_one_exchange_rejected() {
        let mut config = AppConfig::default();
        config.history.limit = 1;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        config.history.limit = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent]
max_writes_per_turn = 3

[storage]
backend = "memory"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_writes_per_turn, 3);
        assert_eq!(config.agent.max_tool_calls, 12);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nmax_tool_calls = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("CLAUDE_MODEL", "claude-3-5-sonnet-latest"),
            ("ANTHROPIC_BASE", "http://localhost:9000/"),
            ("SLO_DB_PATH", "/tmp/slo-test.db"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert!(config.has_api_key());
        assert_eq!(config.provider.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.provider.base_url, "http://localhost:9000");
        assert_eq!(config.storage.database_path(), PathBuf::from("/tmp/slo-test.db"));
    }

    #[test]
    fn key_without_prefix_is_not_usable() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("not-a-key".into());
        assert!(!config.has_api_key());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret-value".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-3-haiku-20240307"));
        assert!(toml_str.contains("max_writes_per_turn"));
    }
}
