//! Command-line interface definition.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};
use l402_kit::config::{BackendKind, ServerConfig};

/// L402 server: Lightning-paid access to protected HTTP resources.
#[derive(Parser, Debug)]
#[command(name = "l402-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "L402_LISTEN_ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// Payment backend.
    #[arg(long, value_enum, env = "L402_BACKEND")]
    pub backend: Option<CliBackend>,

    /// LND REST host (`host`, `host:port` or URL).
    #[arg(long, env = "L402_LND_HOST")]
    pub lnd_host: Option<String>,

    /// Hex-encoded LND macaroon.
    #[arg(long, env = "L402_LND_MACAROON", hide_env_values = true)]
    pub lnd_macaroon: Option<String>,

    /// Accept the self-signed certificate of the LND node.
    #[arg(long, env = "L402_LND_ACCEPT_INVALID_CERTS")]
    pub lnd_accept_invalid_certs: bool,

    /// Payment backend call timeout in seconds.
    #[arg(long, env = "L402_BACKEND_TIMEOUT_SECS")]
    pub backend_timeout_secs: Option<u64>,

    /// Credential lifetime in seconds (0 disables expiry).
    #[arg(long, env = "L402_CREDENTIAL_TTL_SECS")]
    pub credential_ttl_secs: Option<u64>,

    /// Settlement maintenance interval in seconds (0 disables it).
    #[arg(long, env = "L402_MAINTENANCE_INTERVAL_SECS")]
    pub maintenance_interval_secs: Option<u64>,

    /// Path to the product catalog JSON.
    #[arg(long, env = "L402_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Price of the protected route's own challenge, in satoshis.
    #[arg(long, env = "L402_PROTECTED_PRICE_SATS")]
    pub protected_price_sats: Option<u64>,

    /// Log level, used when `RUST_LOG` is not set.
    #[arg(long, env = "L402_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file.
    #[arg(long, short, env = "L402_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Backend CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliBackend {
    /// An LND node over REST.
    Lnd,
    /// In-process simulated backend.
    Simulated,
}

impl Cli {
    /// Convert CLI arguments into a ServerConfig.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<ServerConfig> {
        let mut config = if let Some(ref path) = self.config {
            ServerConfig::from_file(path)?
        } else {
            ServerConfig::default()
        };

        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if let Some(host) = self.lnd_host {
            config.lnd.host = Some(host);
        }
        if let Some(macaroon) = self.lnd_macaroon {
            config.lnd.macaroon = Some(macaroon);
        }
        config.lnd.accept_invalid_certs |= self.lnd_accept_invalid_certs;
        if let Some(secs) = self.backend_timeout_secs {
            config.backend_timeout_secs = secs;
        }
        if let Some(secs) = self.credential_ttl_secs {
            config.credential_ttl_secs = secs;
        }
        if let Some(secs) = self.maintenance_interval_secs {
            config.maintenance_interval_secs = secs;
        }
        if let Some(catalog) = self.catalog {
            config.catalog_path = catalog;
        }
        if let Some(price) = self.protected_price_sats {
            config.protected_price_sats = price;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}

impl From<CliBackend> for BackendKind {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Lnd => BackendKind::Lnd,
            CliBackend::Simulated => BackendKind::Simulated,
        }
    }
}
