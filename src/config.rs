//! TOML configuration for the client core.
//!
//! Provides two loading methods:
//! - `default_config()` - Loads the config embedded in the binary
//! - `load_config(path)` - Loads a user file; missing keys keep their defaults
//!
//! `AIZEN_BASE_URL` in the environment overrides `base_url` for both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

/// Embedded defaults, loaded from `config/client.toml`.
const DEFAULT_CONFIG: &str = include_str!("../config/client.toml");

/// Environment variable that overrides `base_url`.
pub const BASE_URL_ENV: &str = "AIZEN_BASE_URL";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Absolute URL of the API server, e.g. `https://aizen.example.com`.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub polling: PollingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Session file for the `file` backend. Defaults to `<data_dir>/aizen/session.json`.
    pub path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            user_agent: "AiZen/1.0".to_string(),
            polling: PollingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_attempts: 25,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: None,
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with everything else at its default.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parsed `base_url`.
    pub fn base(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base_url '{}'", self.base_url))?;
        if url.cannot_be_a_base() {
            bail!("base_url '{}' cannot be used as a base URL", self.base_url);
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved session file location for the `file` backend.
    pub fn session_path(&self) -> Option<PathBuf> {
        self.storage
            .path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("aizen").join("session.json")))
    }

    fn apply_env(self) -> Self {
        self.with_url_override(std::env::var(BASE_URL_ENV).ok())
    }

    fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        self
    }

    fn validate(self) -> Result<Self> {
        self.base()?;
        if self.polling.max_attempts == 0 {
            bail!("polling.max_attempts must be at least 1");
        }
        if self.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than 0");
        }
        Ok(self)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Parse a config from TOML text without consulting the environment.
pub fn parse_config(content: &str) -> Result<ClientConfig> {
    let config: ClientConfig = toml::from_str(content).context("Invalid client config TOML")?;
    config.validate()
}

/// Load a config file from `path`.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: ClientConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid client config in {:?}", path))?;
    config.apply_env().validate()
}

/// Get the default config embedded in the binary, with the environment
/// override applied and validated.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_config() -> Result<ClientConfig> {
    embedded_config(std::env::var(BASE_URL_ENV).ok())
}

fn embedded_config(url_override: Option<String>) -> Result<ClientConfig> {
    let config: ClientConfig =
        toml::from_str(DEFAULT_CONFIG).expect("embedded client.toml must be valid TOML");
    config
        .with_url_override(url_override)
        .validate()
        .with_context(|| format!("Invalid {} override", BASE_URL_ENV))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_embedded_config_matches_polling_budget() {
        let config: ClientConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.polling.interval_ms, 5000);
        assert_eq!(config.polling.max_attempts, 25);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
            base_url = "https://api.example.com"

            [polling]
            interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.polling.max_attempts, 25);
        assert_eq!(config.user_agent, "AiZen/1.0");
    }

    #[test]
    fn test_storage_backend_parses_lowercase() {
        let config = parse_config(
            r#"
            [storage]
            backend = "memory"
            path = "/tmp/aizen-session.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(
            config.session_path(),
            Some(PathBuf::from("/tmp/aizen-session.json"))
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = parse_config(r#"base_url = "not a url""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = parse_config(
            r#"
            [polling]
            max_attempts = 0
            "#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("max_attempts"), "unexpected error: {}", err);
    }

    #[test]
    fn test_embedded_config_rejects_bad_override() {
        let err = embedded_config(Some("not a url".to_string())).unwrap_err();
        assert!(format!("{:#}", err).contains(BASE_URL_ENV));

        let config = embedded_config(Some(" https://api.example.com ".to_string())).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(embedded_config(None).unwrap().base_url, "http://localhost:8000");
    }

    #[test]
    fn test_load_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load_config(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.toml"));
    }
}
