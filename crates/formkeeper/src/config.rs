//! Configuration management for formkeeper.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "formkeeper";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FORMKEEPER_`)
/// 2. TOML config file at `~/.config/formkeeper/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP front-end configuration.
    pub http: HttpConfig,
    /// Relay listener configuration.
    pub relay: RelayConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
}

/// HTTP front-end configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the HTTP server binds to.
    pub bind_address: IpAddr,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Directory that static files and the fixed pages are served from.
    pub web_root: PathBuf,
}

/// Relay listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay listener binds to. Loopback by default; the only
    /// expected sender is the HTTP front end in the same process.
    pub bind_address: IpAddr,
    /// Port the relay listener receives datagrams on.
    pub port: u16,
    /// Upper bound on a single received datagram, in bytes. Anything past
    /// this is truncated by the receive.
    pub max_datagram_bytes: usize,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the JSON store file.
    pub store_path: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            web_root: PathBuf::from("static"),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            max_datagram_bytes: 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("storage/data.json"),
        }
    }
}

impl HttpConfig {
    /// The full socket address the HTTP server binds to.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl RelayConfig {
    /// The full socket address the relay listener binds to, and the HTTP
    /// front end sends to.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `FORMKEEPER_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("FORMKEEPER_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.relay.max_datagram_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "max_datagram_bytes must be greater than 0".to_string(),
            });
        }

        if self.http.web_root.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                message: "web_root must not be empty".to_string(),
            });
        }

        if self.storage.store_path.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                message: "store_path must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_addresses() {
        let config = Config::default();
        assert_eq!(config.http.socket_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.relay.socket_addr().to_string(), "127.0.0.1:5000");
    }

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert_eq!(config.http.web_root, PathBuf::from("static"));
        assert_eq!(config.storage.store_path, PathBuf::from("storage/data.json"));
    }

    #[test]
    fn test_validate_rejects_zero_datagram_size() {
        let mut config = Config::default();
        config.relay.max_datagram_bytes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_datagram_bytes"));
    }

    #[test]
    fn test_validate_rejects_empty_web_root() {
        let mut config = Config::default();
        config.http.web_root = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_store_path() {
        let mut config = Config::default();
        config.storage.store_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_default_config_path_ends_with_expected_name() {
        let path = Config::default_config_path();
        assert!(path.ends_with("formkeeper/config.toml"));
    }
}
