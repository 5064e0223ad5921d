//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "approle.toml",
    "config.toml",
    "./config/approle.toml",
    "/etc/approle/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("APPROLE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply overrides from `lookup`. Tool-specific names win over Vault's own.
fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let either = |specific: &str, generic: &str| lookup(specific).or_else(|| lookup(generic));

    // Vault
    if let Some(val) = either("APPROLE_VAULT_ADDR", "VAULT_ADDR") {
        config.vault.addr = val;
    }
    if let Some(val) = either("APPROLE_VAULT_TOKEN", "VAULT_TOKEN") {
        config.vault.token = Some(val);
    }
    if let Some(val) = either("APPROLE_VAULT_NAMESPACE", "VAULT_NAMESPACE") {
        config.vault.namespace = Some(val);
    }
    if let Some(val) = lookup("APPROLE_VAULT_TIMEOUT_MS") {
        if let Ok(timeout) = val.parse() {
            config.vault.timeout_ms = timeout;
        }
    }

    // State
    if let Some(val) = lookup("APPROLE_STATE_DIR") {
        config.state.dir = val;
    }

    // Defaults
    if let Some(val) = lookup("APPROLE_DEFAULT_MOUNT") {
        config.defaults.mount = val;
    }
}
