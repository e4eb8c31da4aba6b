//! Gateway configuration
//!
//! Two TOML documents: the gateway config (server, auth, recorder
//! sections) and the catalog file (providers, models, credentials). The
//! catalog file is how the external configuration sync seeds the catalog
//! store; hot reload happens by installing a fresh snapshot.

mod catalog_file;
mod gateway;

pub use catalog_file::CatalogFile;
pub use gateway::{AuthConfig, GatewayConfig, RecorderConfig, ServerConfig};

use thiserror::Error;

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
