//! Configuration management for Playpen
//!
//! Handles loading, parsing, validating, and overriding configuration from
//! a YAML file, environment variables, and CLI flags.

use crate::cli::Cli;
use crate::error::{PlaypenError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Main configuration structure for Playpen
///
/// Holds everything needed to reach the execution backend and to build
/// shareable playground URLs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Execution backend settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Playground URL settings
    #[serde(default)]
    pub playground: PlaygroundConfig,
}

/// Execution backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the execution service
    ///
    /// Configurable so tests can point the client at a mock server.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Playground URL settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    /// Base page the session URL is built on
    ///
    /// The share URL is this base with a `session_id` query parameter.
    #[serde(default = "default_playground_base")]
    pub base_url: String,
}

fn default_playground_base() -> String {
    "http://localhost:3000/playground".to_string()
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            base_url: default_playground_base(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file with CLI overrides applied
    ///
    /// A missing file is not an error: defaults are used so the tool works
    /// out of the box against a local backend. CLI flags (which also pick
    /// up their environment variables) win over the file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>, cli: &Cli) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(PlaypenError::Io)?;
            serde_yaml::from_str(&contents).map_err(PlaypenError::Yaml)?
        } else {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            Config::default()
        };

        if let Some(api_base) = &cli.api_base {
            config.backend.api_base = api_base.clone();
        }
        if let Some(playground_url) = &cli.playground_url {
            config.playground.base_url = playground_url.clone();
        }

        Ok(config)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when an endpoint is not an absolute http(s) URL or
    /// the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        validate_http_url("backend.api_base", &self.backend.api_base)?;
        validate_http_url("playground.base_url", &self.playground.base_url)?;

        if self.backend.timeout_secs == 0 {
            return Err(
                PlaypenError::Config("backend.timeout_secs must be positive".to_string()).into(),
            );
        }
        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|err| PlaypenError::Config(format!("{field} is not a valid URL: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => {
            Err(PlaypenError::Config(format!("{field} must be http(s), got {other}")).into())
        }
    }
}
