//! Configuration models for qe-prefs.
//!
//! Everything the operator can tune lives here and is resolved at runtime
//! from a TOML file, with CLI flags layered on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// System instruction attached to every emitted preference pair.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI assistant. You will be given a sentence to translate:";

/// Top-level configuration for qe-prefs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Quality-estimation service
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Scoring pass settings
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Preference-pair pass settings
    #[serde(default)]
    pub pairs: PairsConfig,
}

/// Quality-estimation oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the scoring service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier passed through to the service
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (can also be set via the env var named by `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds. Large models are slow; keep this generous.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_model() -> String {
    "Unbabel/wmt23-cometkiwi-da-xxl".to_string()
}

fn default_api_key_env() -> String {
    "QE_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    900
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Scoring pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Tasks per oracle call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Scored-task stream (opened in append mode)
    #[serde(default = "default_scored_output")]
    pub output: PathBuf,
}

fn default_batch_size() -> usize {
    32
}

fn default_scored_output() -> PathBuf {
    PathBuf::from("translated_gaois_graded.jsonl")
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            output: default_scored_output(),
        }
    }
}

/// Preference-pair pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairsConfig {
    /// Instruction written into the `system` field of every pair
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// How exact score ties are resolved
    #[serde(default)]
    pub tie_policy: TiePolicy,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for PairsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            tie_policy: TiePolicy::default(),
        }
    }
}

/// Named tie-break policy.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum TiePolicy {
    /// On an exact tie, the reference translation wins over the machine one
    #[default]
    PreferReference,
    /// Keep the stable score order as-is
    RankOrder,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scoring.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "scoring.batch_size must be at least 1".to_string(),
            ));
        }
        if self.oracle.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "oracle.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the oracle API key from config or environment.
    ///
    /// A missing key is not an error: local scoring services usually run
    /// without auth.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.oracle.api_key {
            return Some(expand_env_vars(key));
        }
        std::env::var(&self.oracle.api_key_env).ok()
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }
    result
}

/// Configuration errors.
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

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.scoring.batch_size, 32);
        assert_eq!(config.oracle.model, "Unbabel/wmt23-cometkiwi-da-xxl");
        assert_eq!(config.pairs.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.pairs.tie_policy, TiePolicy::PreferReference);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = Config::from_toml(
            r#"
[oracle]
base_url = "https://qe.example.org"
timeout_secs = 60

[scoring]
batch_size = 8
output = "scored.jsonl"

[pairs]
tie_policy = "rank_order"
"#,
        )
        .unwrap();

        assert_eq!(config.oracle.base_url, "https://qe.example.org");
        assert_eq!(config.oracle.timeout_secs, 60);
        assert_eq!(config.scoring.batch_size, 8);
        assert_eq!(config.scoring.output, PathBuf::from("scored.jsonl"));
        assert_eq!(config.pairs.tie_policy, TiePolicy::RankOrder);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = Config::from_toml("[scoring]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = Config::default();
        config.oracle.api_key = Some("sk-inline".to_string());
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-inline"));
    }

    #[test]
    fn test_unset_placeholder_is_left_alone() {
        assert_eq!(
            expand_env_vars("${QE_PREFS_SURELY_UNSET_VAR}"),
            "${QE_PREFS_SURELY_UNSET_VAR}"
        );
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/qe.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/qe.toml"));
    }
}
