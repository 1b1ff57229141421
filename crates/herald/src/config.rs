// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration:
//!
//! ```toml
//! uri = "app://*:0"
//! discovery = "mdns"
//! log_level = "info"
//!
//! [tcp]
//! nodelay = true
//! send_high_water_mark = 4194304
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TcpConfig;
use crate::uri::EndpointUri;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Discovery backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryBackend {
    /// Multicast DNS (requires the `mdns` feature).
    #[default]
    Mdns,
    /// Do not advertise.
    None,
}

impl FromStr for DiscoveryBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mdns" => Ok(Self::Mdns),
            "none" | "off" | "disabled" => Ok(Self::None),
            other => Err(ConfigError::Invalid(format!(
                "unknown discovery backend '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DiscoveryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mdns => write!(f, "mdns"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Publisher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Endpoint URI, `scheme://host:port`.
    pub uri: String,

    /// Discovery backend.
    #[serde(default)]
    pub discovery: DiscoveryBackend,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// TCP transport tuning.
    #[serde(default)]
    pub tcp: TcpConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PublisherConfig {
    /// Configuration for `uri` with default settings.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            discovery: DiscoveryBackend::default(),
            log_level: default_log_level(),
            tcp: TcpConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn with_discovery(mut self, discovery: DiscoveryBackend) -> Self {
        self.discovery = discovery;
        self
    }

    /// Parsed endpoint URI.
    pub fn endpoint_uri(&self) -> Result<EndpointUri, ConfigError> {
        self.uri
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("uri '{}': {}", self.uri, e)))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_uri()?;
        self.tcp
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("tcp: {}", e)))?;
        if cfg!(not(feature = "mdns")) && self.discovery == DiscoveryBackend::Mdns {
            return Err(ConfigError::Invalid(
                "mdns discovery requested but the mdns feature is disabled".into(),
            ));
        }
        Ok(())
    }
}

impl FromStr for PublisherConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config() {
        let config: PublisherConfig = "uri = \"app://*:0\"".parse().unwrap();
        assert_eq!(config.discovery, DiscoveryBackend::Mdns);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.tcp, TcpConfig::default());
        assert_eq!(config.endpoint_uri().unwrap().scheme(), "app");
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            uri = "app://10.0.0.1:5555"
            discovery = "none"
            log_level = "debug"

            [tcp]
            nodelay = false
            send_high_water_mark = 1024
        "#;
        let config: PublisherConfig = text.parse().unwrap();
        assert_eq!(config.discovery, DiscoveryBackend::None);
        assert!(!config.tcp.nodelay);
        assert_eq!(config.tcp.send_high_water_mark, 1024);
        assert_eq!(config.tcp.listen_backlog, TcpConfig::default().listen_backlog);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_uri_rejected() {
        let result: Result<PublisherConfig, _> = "discovery = \"none\"".parse();
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_invalid_uri_rejected() {
        let config = PublisherConfig::new("no-scheme");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "uri = \"app://*:0\"\ndiscovery = \"none\"").unwrap();
        let config = PublisherConfig::from_file(file.path()).unwrap();
        assert_eq!(config.discovery, DiscoveryBackend::None);
    }

    #[test]
    fn test_from_missing_file() {
        let result = PublisherConfig::from_file("/nonexistent/herald.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("MDNS".parse::<DiscoveryBackend>().unwrap(), DiscoveryBackend::Mdns);
        assert_eq!("off".parse::<DiscoveryBackend>().unwrap(), DiscoveryBackend::None);
        assert!("consul".parse::<DiscoveryBackend>().is_err());
    }

    #[test]
    fn test_roundtrip_serialization() {
        let config = PublisherConfig::new("app://*:0").with_discovery(DiscoveryBackend::None);
        let text = toml::to_string(&config).unwrap();
        let back: PublisherConfig = text.parse().unwrap();
        assert_eq!(back, config);
    }
}
