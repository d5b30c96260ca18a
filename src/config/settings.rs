//! Service settings loaded from `spinventory.toml`.
//!
//! Every section and field has a default, so a missing file or a file with
//! only some keys set both produce a usable configuration.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "spinventory.toml";

/// The whole settings file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Outgoing mail settings
    pub mail: MailConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
    /// Allow any origin (browser clients served from elsewhere)
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            cors_permissive: true,
        }
    }
}

/// `[mail]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailConfig {
    /// Provider endpoint messages are POSTed to; unset means log-only delivery
    pub endpoint: Option<String>,
    /// Sender address
    pub from: String,
    /// Subject line of export mails
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            from: "inventory@spinventory.local".to_string(),
            subject: "Spinventory Export".to_string(),
        }
    }
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML is invalid.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from `path`, falling back to defaults if the file is absent.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No settings file at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    debug!("Loading settings from {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Loads settings from the default location (`./spinventory.toml`).
pub fn load_default_config() -> Result<AppConfig> {
    load_config(DEFAULT_CONFIG_PATH)
}
