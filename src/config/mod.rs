//! Gateway configuration.
//!
//! Read once at startup from a TOML file. Each `[backends.NAME]` table becomes
//! an immutable [`BackendSettings`]; the presence of `base_url` selects the
//! OpenAI-compatible variant, its absence the native Gemini variant.

use crate::conversation::DEFAULT_HISTORY_LIMIT;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LLM_GATEWAY_CONFIG";

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8787";
pub const DEFAULT_HISTORY_PATH: &str = "conversation_history.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Backend '{backend}' has no API key (set api_key or api_key_env)")]
    MissingApiKey { backend: String },
    #[error("Backend '{backend}' has no model configured")]
    MissingModel { backend: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server binds.
    pub listen: String,
    /// Conversation file read by `conversation/load` when the request names none.
    pub history_path: PathBuf,
    /// Append each completed single-message exchange to the backend's history.
    pub record_history: bool,
    /// Messages kept per backend history, oldest dropped first (0 = unbounded).
    pub history_limit: usize,
    pub backends: HashMap<String, BackendConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            record_history: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
            backends: HashMap::new(),
        }
    }
}

/// One `[backends.NAME]` table as written.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(alias = "url")]
    pub base_url: Option<String>,
    #[serde(alias = "token")]
    pub api_key: Option<String>,
    /// Environment variable holding the key, read when `api_key` is unset.
    pub api_key_env: Option<String>,
    pub model: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_env", &self.api_key_env)
            .field("model", &self.model)
            .finish()
    }
}

/// Resolved, immutable settings for one backend.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendSettings {
    OpenAiCompatible {
        base_url: String,
        api_key: String,
        model: String,
    },
    Native {
        api_key: String,
        model: String,
    },
}

impl BackendSettings {
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } | Self::Native { model, .. } => model,
        }
    }
}

impl std::fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAiCompatible {
                base_url, model, ..
            } => f
                .debug_struct("OpenAiCompatible")
                .field("base_url", base_url)
                .field("api_key", &"[REDACTED]")
                .field("model", model)
                .finish(),
            Self::Native { model, .. } => f
                .debug_struct("Native")
                .field("api_key", &"[REDACTED]")
                .field("model", model)
                .finish(),
        }
    }
}

impl BackendConfig {
    /// Resolve into settings, looking up `api_key_env` through `lookup`.
    pub fn resolve_with(
        &self,
        name: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<BackendSettings, ConfigError> {
        let model = self
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingModel {
                backend: name.to_string(),
            })?;

        let api_key = self
            .api_key
            .clone()
            .or_else(|| self.api_key_env.as_deref().and_then(&lookup));

        match self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            // Local OpenAI-compatible servers often run without a key
            Some(base_url) => Ok(BackendSettings::OpenAiCompatible {
                base_url: base_url.to_string(),
                api_key: api_key.unwrap_or_default(),
                model,
            }),
            None => {
                let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                    ConfigError::MissingApiKey {
                        backend: name.to_string(),
                    }
                })?;
                Ok(BackendSettings::Native { api_key, model })
            }
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/llm-gateway/config.toml` or the platform equivalent.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("llm-gateway").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".llm-gateway/config.toml"))
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, else `$LLM_GATEWAY_CONFIG`, else the default path.
    ///
    /// A missing file at the default location yields the default config; an
    /// explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => path,
            None => {
                let path = Self::default_path();
                if !path.exists() {
                    tracing::info!(path = %path.display(), "No config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let content =
            std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                path: config_path.clone(),
                source,
            })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %config_path.display(), backends = config.backends.len(), "Loaded config");
        Ok(config)
    }

    /// Resolve every backend, reading key variables from the environment.
    pub fn backend_settings(&self) -> Result<HashMap<String, BackendSettings>, ConfigError> {
        self.backend_settings_with(|var| std::env::var(var).ok())
    }

    pub fn backend_settings_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<HashMap<String, BackendSettings>, ConfigError> {
        self.backends
            .iter()
            .map(|(name, backend)| Ok((name.clone(), backend.resolve_with(name, &lookup)?)))
            .collect()
    }
}
