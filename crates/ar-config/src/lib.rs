//! AppRole Tooling Configuration
//!
//! TOML configuration with environment variable overrides, plus loading of
//! role documents (one `RoleConfig` per TOML file).

use ar_core::{RoleConfig, DEFAULT_MOUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vault: VaultConfig,
    pub state: StateConfig,
    pub defaults: DefaultsConfig,
}

/// Vault connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub addr: String,
    /// Falls back to `VAULT_TOKEN` when unset
    pub token: Option<String>,
    /// Enterprise namespace, sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    pub timeout_ms: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:8200".to_string(),
            token: None,
            namespace: None,
            timeout_ms: 30_000,
        }
    }
}

impl VaultConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("addr", &self.addr)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("namespace", &self.namespace)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Where last-synced role state is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub dir: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: "./data/approle-state".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Mount used by role documents that do not name one
    pub mount: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            mount: DEFAULT_MOUNT.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# AppRole tooling configuration
# Environment variables override these settings

[vault]
addr = "http://127.0.0.1:8200"
# token = "..."          # or APPROLE_VAULT_TOKEN / VAULT_TOKEN
# namespace = "admin"    # Vault Enterprise only
timeout_ms = 30000

[state]
dir = "./data/approle-state"

[defaults]
mount = "approle"
"#
        .to_string()
    }
}

/// Load a role document.
///
/// A document without `mount` gets `default_mount`. Identity components are
/// trimmed of whitespace and slashes. Documents that populate both halves of
/// a legacy/modern pair are rejected.
pub fn load_role_file<P: AsRef<Path>>(
    path: P,
    default_mount: &str,
) -> Result<RoleConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_role(&content, default_mount)
}

pub fn parse_role(content: &str, default_mount: &str) -> Result<RoleConfig, ConfigError> {
    let mut table: toml::Table = toml::from_str(content)?;
    table
        .entry("mount")
        .or_insert_with(|| toml::Value::String(default_mount.to_string()));
    let mut role: RoleConfig = toml::Value::Table(table).try_into()?;

    role.mount = role.mount.trim().trim_matches('/').to_string();
    role.role_name = role.role_name.trim().trim_matches('/').to_string();

    if role.mount.is_empty() {
        return Err(ConfigError::ValidationError("mount must not be empty".to_string()));
    }
    if role.role_name.is_empty() {
        return Err(ConfigError::ValidationError("role_name must not be empty".to_string()));
    }
    if let Some((legacy, modern)) = role.conflicts().into_iter().next() {
        return Err(ConfigError::ValidationError(format!(
            "{} is deprecated in favour of {}; set only one of them",
            legacy, modern
        )));
    }

    Ok(role)
}
