//! Client configuration structures

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::legacy::LegacyTransport;
use crate::transport::{PolicyTransport, Result};
use crate::xen_api::XenApiTransport;

/// Default location of the client configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/xen/xs-client.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level client configuration from /etc/xen/xs-client.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Which daemon API generation is active
    #[serde(default)]
    pub api: ApiGeneration,

    /// Xen-API transport configuration
    #[serde(default)]
    pub xen_api: XenApiConfig,

    /// Legacy xend transport configuration
    #[serde(default)]
    pub legacy: LegacyConfig,

    /// Policy file lookup configuration
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Daemon API generation; selects the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiGeneration {
    #[default]
    XenApi,
    Legacy,
}

impl std::str::FromStr for ApiGeneration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xen-api" | "xenapi" => Ok(ApiGeneration::XenApi),
            "legacy" | "xend" => Ok(ApiGeneration::Legacy),
            other => Err(format!(
                "unknown API generation '{}' (expected 'xen-api' or 'legacy')",
                other
            )),
        }
    }
}

/// Xen-API transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XenApiConfig {
    /// Endpoint of the daemon's Xen-API server
    #[serde(default = "default_xen_api_url")]
    pub url: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl Default for XenApiConfig {
    fn default() -> Self {
        Self {
            url: default_xen_api_url(),
            username: default_username(),
            password: String::new(),
        }
    }
}

/// Legacy xend transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// xend's Unix domain socket
    #[serde(default = "default_legacy_socket")]
    pub socket: PathBuf,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            socket: default_legacy_socket(),
        }
    }
}

/// Policy file lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Searched after the current directory
    #[serde(default = "default_system_dir")]
    pub system_dir: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            system_dir: default_system_dir(),
        }
    }
}

// Serde default functions
fn default_xen_api_url() -> String {
    "http://localhost:9363/".to_string()
}

fn default_username() -> String {
    "root".to_string()
}

fn default_legacy_socket() -> PathBuf {
    PathBuf::from("/var/run/xend/xmlrpc.sock")
}

fn default_system_dir() -> PathBuf {
    PathBuf::from(xs_policy::SYSTEM_POLICY_DIR)
}

impl ClientConfig {
    /// Load client config from a TOML file
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config, returning the defaults only if the file doesn't exist.
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: &Path) -> std::result::Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Build the transport for the configured API generation.
    pub fn transport(&self) -> Result<Box<dyn PolicyTransport>> {
        tracing::debug!("Selecting {:?} transport", self.api);
        Ok(match self.api {
            ApiGeneration::XenApi => Box::new(XenApiTransport::new(&self.xen_api)?),
            ApiGeneration::Legacy => Box::new(LegacyTransport::new(&self.legacy.socket)),
        })
    }

    /// Policy resolver searching the current directory, then the system dir.
    pub fn resolver(&self) -> xs_policy::PolicyResolver {
        xs_policy::PolicyResolver::new(self.policy.system_dir.clone())
    }
}
