use crate::defaults;
use crate::error::{BergvoxError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub stt: SttConfig,
    pub pipeline: PipelineSection,
    pub transport: TransportConfig,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to the Whisper model file (GGML format).
    pub model: String,
    /// Pinned transcription language; never auto-detected.
    pub language: String,
}

/// Pipeline limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    /// Per-invocation budget, humantime syntax ("60s", "2m").
    pub timeout: String,
    pub max_concurrent_transcriptions: usize,
}

/// Messaging transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Name of the environment variable holding the bot token. The token
    /// itself never lives in the config file.
    pub token_env: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL_PATH.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            timeout: format!("{}s", defaults::DEFAULT_TIMEOUT_SECS),
            max_concurrent_transcriptions: defaults::MAX_CONCURRENT_TRANSCRIPTIONS,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            token_env: defaults::TOKEN_ENV.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BergvoxError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                BergvoxError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file does
    /// not exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(BergvoxError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - BERGVOX_MODEL → stt.model
    /// - BERGVOX_LANGUAGE → stt.language
    /// - BERGVOX_TOKEN_ENV → transport.token_env
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("BERGVOX_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("BERGVOX_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(token_env) = std::env::var("BERGVOX_TOKEN_ENV")
            && !token_env.is_empty()
        {
            self.transport.token_env = token_env;
        }

        self
    }

    /// Parse the per-invocation timeout.
    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.pipeline.timeout).map_err(|e| {
            BergvoxError::ConfigInvalidValue {
                key: "pipeline.timeout".to_string(),
                message: format!("'{}': {}", self.pipeline.timeout, e),
            }
        })
    }

    /// Read the bot token from the environment variable named by
    /// `transport.token_env`. The service refuses to start without it.
    pub fn token(&self) -> Result<String> {
        match std::env::var(&self.transport.token_env) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => Err(BergvoxError::TokenMissing {
                var: self.transport.token_env.clone(),
            }),
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/bergvox/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bergvox")
            .join("config.toml")
    }
}
