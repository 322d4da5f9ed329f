//! Layered server settings.
//!
//! Sources, lowest precedence first: built-in defaults, the settings file
//! (`certgate.toml` unless `--config` names another), then `CERTGATE__*`
//! environment variables such as `CERTGATE__SERVER__PORT=9443`.

use crate::error::ServerError;
use cert_gateway::GatewayConfig;
use cert_identity::IdentityConfig;
use cert_logging::LoggerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "certgate.toml";
pub const ENV_PREFIX: &str = "CERTGATE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub identity: IdentityConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub tls: TlsSettings,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
            tls: TlsSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub enabled: bool,
    /// Server certificate chain (PEM)
    pub cert: Option<PathBuf>,
    /// Server private key (PEM: PKCS#8, PKCS#1 or SEC1)
    pub key: Option<PathBuf>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cert: None,
            key: None,
        }
    }
}

impl Settings {
    /// Load settings from `path` (required) or the default file (optional).
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
