//! Configuration for the L402 server.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{engine::EngineConfig, types::Amount};

/// Which payment backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// An LND node over its REST API.
    #[default]
    Lnd,
    /// The in-process simulated backend. Invoices never settle on their own.
    Simulated,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Payment backend.
    #[serde(default)]
    pub backend: BackendKind,

    /// LND connection, required when `backend = "lnd"`.
    #[serde(default)]
    pub lnd: LndConfig,

    /// Upper bound on each payment backend call, in seconds.
    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,

    /// How long an issued credential is accepted, in seconds. 0 disables expiry.
    #[serde(default = "default_credential_ttl_secs")]
    pub credential_ttl_secs: u64,

    /// Interval of the settlement maintenance task, in seconds. 0 disables it.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,

    /// Path to the product catalog JSON.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Price of the challenge the protected route issues to clients that show
    /// up without credentials, in satoshis.
    #[serde(default = "default_protected_price_sats")]
    pub protected_price_sats: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// LND connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LndConfig {
    /// Host, `host:port` or base URL of the REST listener.
    #[serde(default)]
    pub host: Option<String>,

    /// Hex-encoded admin or invoice macaroon.
    #[serde(default)]
    pub macaroon: Option<String>,

    /// Accept self-signed TLS certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backend: BackendKind::default(),
            lnd: LndConfig::default(),
            backend_timeout_secs: default_backend_timeout_secs(),
            credential_ttl_secs: default_credential_ttl_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            catalog_path: default_catalog_path(),
            protected_price_sats: default_protected_price_sats(),
            log_level: default_log_level(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

const fn default_backend_timeout_secs() -> u64 {
    10
}

const fn default_credential_ttl_secs() -> u64 {
    3600
}

const fn default_maintenance_interval_secs() -> u64 {
    30
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("sample_data.json")
}

const fn default_protected_price_sats() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Check settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "backend_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }

        self.protected_price()?;

        self.engine_config()
            .validate()
            .map_err(|err| ConfigError::Invalid {
                field: "credential_ttl_secs",
                reason: err.to_string(),
            })?;

        if self.backend == BackendKind::Lnd {
            if self.lnd.host.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Missing("lnd.host"));
            }
            if self.lnd.macaroon.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Missing("lnd.macaroon"));
            }
        }

        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn credential_ttl(&self) -> Option<Duration> {
        (self.credential_ttl_secs > 0).then(|| Duration::from_secs(self.credential_ttl_secs))
    }

    pub fn maintenance_interval(&self) -> Option<Duration> {
        (self.maintenance_interval_secs > 0)
            .then(|| Duration::from_secs(self.maintenance_interval_secs))
    }

    pub fn protected_price(&self) -> Result<Amount, ConfigError> {
        Amount::try_from(self.protected_price_sats).map_err(|err| ConfigError::Invalid {
            field: "protected_price_sats",
            reason: err.to_string(),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::builder()
            .backend_timeout(self.backend_timeout())
            .maybe_credential_ttl(self.credential_ttl())
            .build()
    }
}
