use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ConfigError;

/// Top-level gateway configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    /// Path to the catalog file; relative paths resolve against the
    /// gateway config's own directory
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request deadline in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Authentication settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Enforce credentials for non-loopback requests
    #[serde(default = "default_true")]
    pub require_auth: bool,
    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            session_ttl_secs: default_session_ttl(),
        }
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs.max(1))
    }
}

/// Invocation recorder settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecorderConfig {
    /// Bounded queue capacity
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Disable the response-text truncation cap
    #[serde(default)]
    pub full_capture: bool,
    /// JSONL output path; records go to an in-memory store when absent
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            full_capture: false,
            output_path: None,
        }
    }
}

impl GatewayConfig {
    /// Load and validate a gateway config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        if config.recorder.queue_size == 0 {
            return Err(ConfigError::Invalid("recorder.queue_size must be > 0".to_owned()));
        }

        // Anchor the catalog path next to the config file
        if let Some(catalog_path) = &config.catalog_path
            && catalog_path.is_relative()
            && let Some(parent) = path.parent()
        {
            config.catalog_path = Some(parent.join(catalog_path));
        }

        Ok(config)
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}
fn default_port() -> u16 {
    8800
}
fn default_request_timeout() -> u64 {
    120
}
fn default_session_ttl() -> u64 {
    60 * 60 * 24
}
fn default_queue_size() -> usize {
    1024
}
const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8800);
        assert!(config.auth.require_auth);
        assert_eq!(config.recorder.queue_size, 1024);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn sections_parse() {
        let config: GatewayConfig = toml::from_str(
            r#"
            catalog_path = "catalog.toml"

            [server]
            host = "0.0.0.0"
            port = 9000
            request_timeout_secs = 30

            [auth]
            require_auth = false
            session_ttl_secs = 3600

            [recorder]
            queue_size = 64
            full_capture = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.auth.require_auth);
        assert_eq!(config.auth.session_ttl(), Duration::from_secs(3600));
        assert!(config.recorder.full_capture);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<GatewayConfig>("[server]\nbogus = 1\n").is_err());
    }
}
