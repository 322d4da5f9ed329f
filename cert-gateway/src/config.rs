use crate::error::{GatewayError, Result};
use crate::source::{CertificateSource, HeaderCertificateSource, PeerCertificateSource};
use http::header::HeaderName;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Certificate from the TLS handshake of this connection
    #[default]
    Peer,
    /// Certificate forwarded in a request header by a trusted proxy
    Header,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub source: SourceKind,
    pub header_name: String,
    /// Status for the failure path. Unset leaves the framework default.
    pub fault_status: Option<u16>,
    /// Answer trust-store mismatches with their own message
    pub distinct_trust_store_message: bool,
    /// Log fingerprint and (redacted) subject of accepted certificates
    pub log_certificates: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Peer,
            header_name: HeaderCertificateSource::DEFAULT_HEADER.to_string(),
            fault_status: None,
            distinct_trust_store_message: false,
            log_certificates: true,
        }
    }
}

impl GatewayConfig {
    /// # Errors
    ///
    /// Fails on an invalid header name or fault status.
    pub fn validate(&self) -> Result<()> {
        self.fault_status_code()?;
        if self.source == SourceKind::Header {
            self.header()?;
        }
        Ok(())
    }

    pub fn fault_status_code(&self) -> Result<Option<StatusCode>> {
        self.fault_status
            .map(|code| {
                StatusCode::from_u16(code)
                    .map_err(|_| GatewayError::Config(format!("invalid fault_status {code}")))
            })
            .transpose()
    }

    pub fn build_source(&self) -> Result<Arc<dyn CertificateSource>> {
        match self.source {
            SourceKind::Peer => Ok(Arc::new(PeerCertificateSource)),
            SourceKind::Header => {
                tracing::info!(
                    header = %self.header_name,
                    "Reading client certificates from request header"
                );
                Ok(Arc::new(HeaderCertificateSource::new(self.header()?)))
            }
        }
    }

    fn header(&self) -> Result<HeaderName> {
        HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|_| {
            GatewayError::Config(format!("invalid header_name {:?}", self.header_name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.source, SourceKind::Peer);
        assert_eq!(config.header_name, "x-client-cert");
        assert!(config.fault_status.is_none());
        assert!(!config.distinct_trust_store_message);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_fault_status() {
        let config = GatewayConfig {
            fault_status: Some(42),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_header_name() {
        let config = GatewayConfig {
            source: SourceKind::Header,
            header_name: "bad header".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.build_source().is_err());
    }

    #[test]
    fn test_deserialize() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"source": "header", "fault_status": 500}"#).unwrap();
        assert_eq!(config.source, SourceKind::Header);
        assert_eq!(
            config.fault_status_code().unwrap(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }
}
