//! Orchestrator configuration.
//!
//! Loaded from a TOML file with environment overrides on top, the same
//! precedence for every deployment: file < environment. The API key is
//! environment-only so it never lands in a config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Model driving the reasoning loop.
    pub model: String,

    /// Model used for delegated web searches.
    pub search_model: String,

    /// Iteration budget per run.
    pub max_iterations: u32,

    /// Seconds to wait for a clarification answer.
    pub clarification_timeout_secs: u64,

    /// Directory for persisted run traces.
    pub trace_dir: PathBuf,

    /// Gemini API key. Environment-only (`GEMINI_API_KEY`).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            search_model: "gemini-2.5-flash".into(),
            max_iterations: 10,
            clarification_timeout_secs: 120,
            trace_dir: PathBuf::from("traces"),
            api_key: None,
        }
    }
}

impl OrchestratorConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY")
            && !key.is_empty()
        {
            self.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("ARBOR_MODEL")
            && !model.is_empty()
        {
            self.model = model;
        }
        if let Ok(dir) = std::env::var("ARBOR_TRACE_DIR")
            && !dir.is_empty()
        {
            self.trace_dir = PathBuf::from(dir);
        }
    }
}
