use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const API_KEY_ENV: &str = "AZURE_OPENAI_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://taskmgrpoc.openai.azure.com";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4";
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
    pub api_key: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn deployment(&self) -> &str {
        self.deployment.as_deref().unwrap_or(DEFAULT_DEPLOYMENT)
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    /// Full chat-completions URL for the configured deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint().trim_end_matches('/'),
            self.deployment(),
            self.api_version()
        )
    }

    /// Resolve the credential once: environment first, then config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        pick_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.clone())
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("taskpilot").join("config.json"))
    }
}

/// Blank values count as absent.
fn pick_api_key(from_env: Option<String>, from_file: Option<String>) -> Option<String> {
    from_env
        .filter(|k| !k.trim().is_empty())
        .or_else(|| from_file.filter(|k| !k.trim().is_empty()))
}
