//! Configuration for the multigrade assistant.
//!
//! Values are layered: built-in defaults, then `~/.multigrade/config.toml`,
//! then `./multigrade.toml`, then environment variables. Files are merged
//! table by table, so a later file only needs the keys it changes.

use multigrade_abstraction::GenerationParameters;
use multigrade_models::{BackendConfig, BackendType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::agents::AgentKind;
use crate::artifacts::NormalizerConfig;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[backend]`: which generation service to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub kind: BackendType,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self { kind: BackendType::Gemini, model: "gemini-2.0-flash".to_string(), api_key: None, base_url: None }
    }
}

/// `[generation]`: sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    pub temperature: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Ask the backend for a JSON response body.
    pub json_output: bool,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self { temperature: 0.7, max_output_tokens: 2048, top_p: None, json_output: true }
    }
}

/// `[retry]`: backoff and timeout policy for backend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub attempt_timeout_secs: u64,
    pub total_timeout_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            backoff_multiplier: 2.0,
            attempt_timeout_secs: 60,
            total_timeout_secs: 180,
        }
    }
}

/// Where generated content is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Lost when the process exits.
    #[default]
    Memory,
    Sqlite,
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub kind: StoreKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Which outcomes the orchestrator writes to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Persist Success and Degraded outcomes.
    #[default]
    Always,
    /// Persist only Success outcomes.
    SuccessOnly,
    /// Never persist; the caller commits explicitly.
    Never,
}

/// `[orchestrator]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    pub persist: PersistPolicy,
    /// How many times a lost version race is re-versioned before giving up.
    pub conflict_retries: u32,
    /// Re-prompts sent when the output held no JSON at all.
    pub repair_attempts: u32,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self { persist: PersistPolicy::Always, conflict_retries: 3, repair_attempts: 1 }
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultigradeConfig {
    pub log_level: String,
    pub backend: BackendSection,
    pub generation: GenerationSection,
    pub retry: RetrySection,
    pub normalizer: NormalizerConfig,
    pub store: StoreSection,
    pub orchestrator: OrchestratorSection,
    /// Prompt template overrides: agent kind to TOML template file.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, PathBuf>,
}

impl Default for MultigradeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            backend: BackendSection::default(),
            generation: GenerationSection::default(),
            retry: RetrySection::default(),
            normalizer: NormalizerConfig::default(),
            store: StoreSection::default(),
            orchestrator: OrchestratorSection::default(),
            templates: BTreeMap::new(),
        }
    }
}

fn read_table(path: &Path) -> ConfigResult<toml::Table> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
    content
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Merges `overlay` into `base`, recursing into nested tables.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

impl MultigradeConfig {
    /// Load configuration from a single TOML file over the defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        Self::from_table(read_table(path)?)
    }

    fn from_table(table: toml::Table) -> ConfigResult<Self> {
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".multigrade")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("multigrade.toml")
    }

    /// Discover and load configuration from the default files and the
    /// process environment, then validate it.
    pub fn discover_and_load() -> ConfigResult<Self> {
        let files = [Self::default_global_path(), Self::default_local_path()];
        Self::load_layered(&files, |key| std::env::var(key).ok())
    }

    /// Merges the existing files among `files` in order, then applies
    /// environment overrides read through `env`. Missing files are skipped;
    /// unreadable or malformed ones are errors.
    pub fn load_layered(
        files: &[PathBuf],
        env: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        let mut merged = toml::Table::new();
        for path in files {
            match read_table(path) {
                Ok(table) => {
                    debug!(path = %path.display(), "Loaded configuration file");
                    merge_tables(&mut merged, table);
                }
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        let mut config = Self::from_table(merged)?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MULTIGRADE_*`, `GEMINI_API_KEY` and `OLLAMA_HOST` overrides.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(kind) = env("MULTIGRADE_BACKEND") {
            self.backend.kind = kind
                .parse()
                .map_err(|()| ConfigError::InvalidValue(format!("MULTIGRADE_BACKEND={kind}")))?;
        }
        if let Some(model) = env("MULTIGRADE_MODEL") {
            self.backend.model = model;
        }
        if let Some(key) = env("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
            self.backend.api_key = Some(key);
        }
        if self.backend.kind == BackendType::Ollama {
            if let Some(host) = env("OLLAMA_HOST") {
                self.backend.base_url = Some(host);
            }
        }
        if let Some(path) = env("MULTIGRADE_STORE_PATH") {
            self.store.kind = StoreKind::Sqlite;
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(level) = env("MULTIGRADE_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Checks values that would otherwise fail later and less clearly.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigError::InvalidValue(msg));
        if self.backend.model.trim().is_empty() {
            return invalid("backend.model must not be empty".into());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return invalid(format!("generation.temperature {} is outside 0..=2", self.generation.temperature));
        }
        if let Some(top_p) = self.generation.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return invalid(format!("generation.top_p {top_p} is outside 0..=1"));
            }
        }
        if self.generation.max_output_tokens == 0 {
            return invalid("generation.max_output_tokens must be positive".into());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }
        if self.retry.backoff_multiplier < 1.0 {
            return invalid("retry.backoff_multiplier must be at least 1.0".into());
        }
        if self.retry.attempt_timeout_secs == 0 || self.retry.total_timeout_secs == 0 {
            return invalid("retry timeouts must be positive".into());
        }
        if self.store.kind == StoreKind::Sqlite && self.store.path.is_none() {
            return invalid("store.path is required for the sqlite store".into());
        }
        for kind in self.templates.keys() {
            if kind.parse::<AgentKind>().is_err() {
                return invalid(format!("templates.{kind} does not name an agent kind"));
            }
        }
        Ok(())
    }

    /// Generation parameters for every backend request.
    pub fn generation_parameters(&self) -> GenerationParameters {
        GenerationParameters {
            temperature: Some(self.generation.temperature),
            top_p: self.generation.top_p,
            max_output_tokens: Some(self.generation.max_output_tokens),
            json_output: self.generation.json_output,
        }
    }

    /// Backend factory input for the `[backend]` section.
    pub fn backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::new(self.backend.kind, self.backend.model.clone());
        if let Some(key) = &self.backend.api_key {
            config = config.with_api_key(key.clone());
        }
        if let Some(url) = &self.backend.base_url {
            config = config.with_base_url(url.clone());
        }
        config
    }

    /// Template overrides keyed by parsed agent kind.
    pub fn template_overrides(&self) -> ConfigResult<Vec<(AgentKind, PathBuf)>> {
        self.templates
            .iter()
            .map(|(kind, path)| {
                kind.parse::<AgentKind>()
                    .map(|k| (k, path.clone()))
                    .map_err(|e| ConfigError::InvalidValue(e.to_string()))
            })
            .collect()
    }

    /// Pretty TOML rendering, with the API key masked.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        let mut shown = self.clone();
        if shown.backend.api_key.is_some() {
            shown.backend.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = MultigradeConfig::default();
        assert_eq!(config.backend.kind, BackendType::Gemini);
        assert!((config.generation.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.generation.max_output_tokens, 2048);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.orchestrator.persist, PersistPolicy::Always);
        assert!(config.normalizer.reject_empty_collections);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_file_overrides_global_per_key() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&global, "[backend]\nkind = \"ollama\"\nmodel = \"mistral\"\n[retry]\nmax_attempts = 5\n").unwrap();
        std::fs::write(&local, "[backend]\nmodel = \"llama3\"\n[orchestrator]\npersist = \"success_only\"\n").unwrap();

        let config = MultigradeConfig::load_layered(&[global, local], no_env).unwrap();
        assert_eq!(config.backend.kind, BackendType::Ollama);
        assert_eq!(config.backend.model, "llama3");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.orchestrator.persist, PersistPolicy::SuccessOnly);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let config =
            MultigradeConfig::load_layered(&[PathBuf::from("/nonexistent/multigrade.toml")], no_env).unwrap();
        assert_eq!(config, MultigradeConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[backend\nkind = ").unwrap();
        assert!(matches!(
            MultigradeConfig::load_layered(&[path], no_env),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_overrides_files() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MULTIGRADE_BACKEND", "ollama"),
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("MULTIGRADE_STORE_PATH", "/tmp/multigrade.db"),
            ("MULTIGRADE_LOG_LEVEL", "debug"),
        ]);
        let config =
            MultigradeConfig::load_layered(&[], |k| env.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(config.backend.kind, BackendType::Ollama);
        assert_eq!(config.backend.base_url.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.store.kind, StoreKind::Sqlite);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_env_backend() {
        let result = MultigradeConfig::load_layered(&[], |k| {
            (k == "MULTIGRADE_BACKEND").then(|| "mistral-cloud".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MultigradeConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = MultigradeConfig::default();
        config.generation.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = MultigradeConfig::default();
        config.store.kind = StoreKind::Sqlite;
        assert!(config.validate().is_err());

        let mut config = MultigradeConfig::default();
        config.templates.insert("quiz_maker".into(), PathBuf::from("quiz.toml"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_rendering_masks_key() {
        let mut config = MultigradeConfig::default();
        config.backend.api_key = Some("secret-key".into());
        let rendered = config.to_toml_string().unwrap();
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("[retry]"));
        let reparsed: MultigradeConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.retry, config.retry);
    }

    #[test]
    fn test_backend_config_and_parameters() {
        let mut config = MultigradeConfig::default();
        config.backend.api_key = Some("k".into());
        let backend = config.backend_config();
        assert_eq!(backend.backend_type, BackendType::Gemini);
        assert_eq!(backend.api_key.as_deref(), Some("k"));
        let params = config.generation_parameters();
        assert_eq!(params.max_output_tokens, Some(2048));
        assert!(params.json_output);
    }
}
