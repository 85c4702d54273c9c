//! Issuer configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (BANTER_*)
//! - TOML configuration file
//!
//! The broker API key is the one secret the service holds. It is injected
//! through configuration and validated once, when the issuance settings are
//! built; a missing key disables issuance for the process but never crashes
//! it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Typed configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The broker API key is absent or blank.
    #[error("broker API key is not configured (set BANTER_BROKER_API_KEY or broker.api_key)")]
    MissingApiKey,
}

/// Issuer service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upstream broker configuration.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Identity handle configuration.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Room configuration.
    #[serde(default)]
    pub room: RoomConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Upstream broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Long-lived broker API key. Never returned to clients.
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    /// Broker token signing endpoint.
    #[serde(default = "default_signing_url")]
    pub signing_url: String,

    /// Lifetime of issued tokens in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

/// Identity handle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Prefix for generated anonymous handles.
    #[serde(default = "default_handle_prefix")]
    pub prefix: String,
}

/// Room configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Channel name tokens are scoped to.
    #[serde(default = "default_channel")]
    pub channel: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Validated settings for constructing the token issuer.
///
/// Building this is the single place the API key requirement is enforced.
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// The broker API key (validated non-empty).
    pub api_key: String,
    /// Broker token signing endpoint.
    pub signing_url: String,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: u64,
    /// Prefix for generated anonymous handles.
    pub handle_prefix: String,
    /// Channel name tokens are scoped to.
    pub channel: String,
}

// Default value functions
fn default_host() -> String {
    std::env::var("BANTER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("BANTER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_api_key() -> Option<String> {
    std::env::var("BANTER_BROKER_API_KEY").ok()
}

fn default_signing_url() -> String {
    std::env::var("BANTER_BROKER_SIGNING_URL")
        .unwrap_or_else(|_| "https://broker.example.com/keys/sign".to_string())
}

fn default_token_ttl() -> u64 {
    3600 // 1 hour
}

fn default_handle_prefix() -> String {
    banter_core::DEFAULT_HANDLE_PREFIX.to_string()
}

fn default_channel() -> String {
    "chat:lobby".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            broker: BrokerConfig::default(),
            identity: IdentityConfig::default(),
            room: RoomConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            signing_url: default_signing_url(),
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            prefix: default_handle_prefix(),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "banter.toml",
            "/etc/banter/banter.toml",
            "~/.config/banter/banter.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Build validated issuer settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] if no broker API key is
    /// configured.
    pub fn issuer_settings(&self) -> Result<IssuerSettings, ConfigError> {
        let api_key = self
            .broker
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(IssuerSettings {
            api_key: api_key.to_string(),
            signing_url: self.broker.signing_url.clone(),
            token_ttl_secs: self.broker.token_ttl_secs,
            handle_prefix: self.identity.prefix.clone(),
            channel: self.room.channel.clone(),
        })
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid host:port")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> Config {
        let mut config = Config::default();
        config.broker.api_key = key.map(String::from);
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.room.channel, "chat:lobby");
        assert_eq!(config.identity.prefix, "guest");
        assert_eq!(config.broker.token_ttl_secs, 3600);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_issuer_settings_with_key() {
        let config = config_with_key(Some("sk_test_123"));
        let settings = config.issuer_settings().unwrap();
        assert_eq!(settings.api_key, "sk_test_123");
        assert_eq!(settings.channel, "chat:lobby");
    }

    #[test]
    fn test_issuer_settings_missing_key() {
        let config = config_with_key(None);
        assert!(matches!(
            config.issuer_settings(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_issuer_settings_blank_key() {
        let config = config_with_key(Some("   "));
        assert!(matches!(
            config.issuer_settings(),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [broker]
            api_key = "sk_live_456"
            token_ttl_secs = 600

            [room]
            channel = "chat:games"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.broker.api_key.as_deref(), Some("sk_live_456"));
        assert_eq!(config.broker.token_ttl_secs, 600);
        assert_eq!(config.room.channel, "chat:games");
    }
}
