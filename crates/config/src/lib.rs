//! Configuration loading, validation, and management for segue.
//!
//! Loads configuration from `~/.segue/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.segue/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used when the conversation carries no provider directive
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used when the conversation carries no model directive
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Token budget for models without a per-model entry
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// How many continuation swaps one relay run may perform.
    /// Zero forbids continuation entirely.
    #[serde(default = "default_max_segments")]
    pub max_segments: u32,

    /// The user turn appended when a truncated segment is continued
    #[serde(default = "default_continue_prompt")]
    pub continue_prompt: String,

    /// Outward and per-segment channel capacity, in chunks
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Known models. A model directive in user text is honored only when
    /// the named model appears here; defaults apply otherwise.
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-3-5-sonnet-latest".into()
}
fn default_max_tokens() -> u32 {
    8000
}
fn default_max_segments() -> u32 {
    2
}
fn default_continue_prompt() -> String {
    "Continue your prior response. IMPORTANT: Immediately begin from where you left off \
     without any interruptions. Do not repeat any content."
        .into()
}
fn default_stream_buffer() -> usize {
    64
}
fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            name: "claude-3-5-sonnet-latest".into(),
            max_tokens: Some(8000),
        },
        ModelConfig {
            name: "claude-3-5-haiku-latest".into(),
            max_tokens: Some(8000),
        },
        ModelConfig {
            name: "gpt-4o".into(),
            max_tokens: None,
        },
        ModelConfig {
            name: "gpt-4o-mini".into(),
            max_tokens: None,
        },
    ]
}

/// One known model and its optional token budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name as sent to the backend
    pub name: String,

    /// Per-model token budget; falls back to `default_max_tokens`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.segue/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `SEGUE_PROVIDER` — default provider
    /// - `SEGUE_MODEL` — default model
    /// - `SEGUE_MAX_SEGMENTS` — continuation swap limit
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(provider) = std::env::var("SEGUE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("SEGUE_MODEL") {
            config.default_model = model;
        }

        if let Ok(raw) = std::env::var("SEGUE_MAX_SEGMENTS") {
            match raw.parse::<u32>() {
                Ok(n) => config.max_segments = n,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "Ignoring unparseable SEGUE_MAX_SEGMENTS override"
                ),
            }
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".segue")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be greater than 0".into(),
            ));
        }

        if self.stream_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "stream_buffer must be greater than 0".into(),
            ));
        }

        if self.continue_prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "continue_prompt must not be empty".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "model entries must have a non-empty name".into(),
                ));
            }
            if model.max_tokens == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}' has a zero token budget",
                    model.name
                )));
            }
            if !seen.insert(model.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate model entry '{}'",
                    model.name
                )));
            }
        }

        Ok(())
    }

    /// Whether `name` appears in the known-model table.
    pub fn knows_model(&self, name: &str) -> bool {
        self.models.iter().any(|m| m.name == name)
    }

    /// Resolve the token budget for `model`.
    pub fn max_tokens_for(&self, model: &str) -> u32 {
        self.models
            .iter()
            .find(|m| m.name == model)
            .and_then(|m| m.max_tokens)
            .unwrap_or(self.default_max_tokens)
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            max_segments: default_max_segments(),
            continue_prompt: default_continue_prompt(),
            stream_buffer: default_stream_buffer(),
            models: default_models(),
        }
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

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.default_model, "claude-3-5-sonnet-latest");
        assert_eq!(config.max_segments, 2);
        assert_eq!(config.default_max_tokens, 8000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.max_segments, config.max_segments);
        assert_eq!(parsed.models.len(), config.models.len());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str("max_segments = 5").unwrap();
        assert_eq!(config.max_segments, 5);
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.stream_buffer, 64);
        assert!(!config.models.is_empty());
    }

    #[test]
    fn zero_segments_is_a_valid_setting() {
        // Zero forbids continuation; it must not be rejected.
        let config: AppConfig = toml::from_str("max_segments = 0").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_segments, 0);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let config = AppConfig {
            default_max_tokens: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_continue_prompt_rejected() {
        let config = AppConfig {
            continue_prompt: "   ".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_model_entries_rejected() {
        let config = AppConfig {
            models: vec![
                ModelConfig {
                    name: "m".into(),
                    max_tokens: None,
                },
                ModelConfig {
                    name: "m".into(),
                    max_tokens: Some(100),
                },
            ],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "anthropic");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openai"
default_model = "gpt-4o"
max_segments = 4

[[models]]
name = "gpt-4o"
max_tokens = 16000
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.max_segments, 4);
        assert_eq!(config.max_tokens_for("gpt-4o"), 16000);
    }

    #[cfg(not(target_os = "windows"))]
    fn set_env(key: &str, value: impl AsRef<std::ffi::OsStr>) {
        // The process env is only touched from the one test below.
        unsafe { std::env::set_var(key, value) };
    }

    #[cfg(not(target_os = "windows"))]
    fn clear_segue_env() {
        unsafe {
            std::env::remove_var("SEGUE_PROVIDER");
            std::env::remove_var("SEGUE_MODEL");
            std::env::remove_var("SEGUE_MAX_SEGMENTS");
        }
    }

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn env_overrides_layer_on_top_of_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".segue")).unwrap();
        std::fs::write(
            dir.path().join(".segue").join("config.toml"),
            r#"
default_provider = "openai"
default_model = "gpt-4o"
default_max_tokens = 9000
max_segments = 5
"#,
        )
        .unwrap();

        let saved_home = std::env::var("HOME").ok();
        set_env("HOME", dir.path());
        set_env("SEGUE_PROVIDER", "bedrock");
        set_env("SEGUE_MODEL", "claude-3-5-haiku-latest");
        set_env("SEGUE_MAX_SEGMENTS", "7");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.default_provider, "bedrock");
        assert_eq!(config.default_model, "claude-3-5-haiku-latest");
        assert_eq!(config.max_segments, 7);
        // Fields without an override still come from the file.
        assert_eq!(config.default_max_tokens, 9000);

        // An unparseable override is ignored; the file value stays.
        set_env("SEGUE_MAX_SEGMENTS", "three");
        let config = AppConfig::load().unwrap();
        assert_eq!(config.max_segments, 5);
        assert_eq!(config.default_provider, "bedrock");

        clear_segue_env();
        match saved_home {
            Some(home) => set_env("HOME", home),
            None => unsafe { std::env::remove_var("HOME") },
        }
    }

    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "continue_prompt = \"\"").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn budget_resolution() {
        let config = AppConfig::default();
        assert_eq!(config.max_tokens_for("claude-3-5-sonnet-latest"), 8000);
        // Known model without a per-model budget uses the global default.
        assert_eq!(config.max_tokens_for("gpt-4o"), 8000);
        // Unknown models also fall back to the default.
        assert_eq!(config.max_tokens_for("unlisted"), 8000);

        assert!(config.knows_model("gpt-4o"));
        assert!(!config.knows_model("unlisted"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-3-5-sonnet-latest"));
        assert!(toml_str.contains("max_segments"));
        assert!(toml_str.contains("continue_prompt"));
    }
}
