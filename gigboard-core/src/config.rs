//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gigboard/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gigboard/` (~/.config/gigboard/)
//! - State/Logs: `$XDG_STATE_HOME/gigboard/` (~/.local/state/gigboard/)

use crate::error::{Error, Result};
use crate::types::Role;
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Remote gateway connection settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Authentication policy settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote gateway connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL (e.g., `https://gateway.example.com`)
    pub base_url: Option<String>,

    /// API key for the gateway project
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_gateway_timeout(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_none() {
            return Err(Error::Config(
                "gateway.base_url is required to connect to a remote gateway".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "gateway.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_gateway_timeout() -> u64 {
    30
}

/// Authentication policy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Role assigned to accounts synthesized on first federated sign-in.
    /// Deliberately a configuration knob rather than a hardcoded default.
    #[serde(default = "default_federated_role")]
    pub default_role_for_federated_sign_in: Role,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_role_for_federated_sign_in: default_federated_role(),
        }
    }
}

fn default_federated_role() -> Role {
    Role::Customer
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gigboard/config.toml` (~/.config/gigboard/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gigboard").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gigboard/` (~/.local/state/gigboard/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gigboard")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gigboard/gigboard.log` (~/.local/state/gigboard/gigboard.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gigboard.log")
    }
}
