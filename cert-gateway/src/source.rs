//! Where the gate finds the client certificate of a request.

use crate::error::ExtractError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use cert_identity::ClientCertificate;
use http::header::HeaderName;
use http::request::Parts;
use std::sync::Arc;

/// Certificates the peer presented during the TLS handshake, leaf first.
///
/// Attached to every request of a connection by the transport layer. An
/// empty chain means the handshake completed without a client certificate.
#[derive(Debug, Clone, Default)]
pub struct PeerCertificates {
    chain: Arc<Vec<Vec<u8>>>,
}

impl PeerCertificates {
    pub fn new(chain: Vec<Vec<u8>>) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }

    /// Marker for a connection whose peer presented nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn to_certificate(&self) -> Option<ClientCertificate> {
        ClientCertificate::from_chain(self.chain.iter().cloned())
    }
}

/// Obtains the client certificate for a request.
///
/// `Ok(None)` means no certificate was presented. Errors are faults, not
/// rejections.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn client_certificate(
        &self,
        parts: &Parts,
    ) -> Result<Option<ClientCertificate>, ExtractError>;
}

/// Reads the [`PeerCertificates`] extension set by the TLS acceptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerCertificateSource;

#[async_trait]
impl CertificateSource for PeerCertificateSource {
    async fn client_certificate(
        &self,
        parts: &Parts,
    ) -> Result<Option<ClientCertificate>, ExtractError> {
        let peer = parts
            .extensions
            .get::<PeerCertificates>()
            .ok_or(ExtractError::TransportUnavailable)?;
        Ok(peer.to_certificate())
    }
}

/// Reads a certificate forwarded by a TLS-terminating proxy.
///
/// Accepts URL-encoded PEM (nginx `$ssl_client_escaped_cert`), plain PEM
/// and base64 DER.
#[derive(Debug, Clone)]
pub struct HeaderCertificateSource {
    header: HeaderName,
}

impl HeaderCertificateSource {
    pub const DEFAULT_HEADER: &'static str = "x-client-cert";

    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for HeaderCertificateSource {
    fn default() -> Self {
        Self::new(HeaderName::from_static(Self::DEFAULT_HEADER))
    }
}

#[async_trait]
impl CertificateSource for HeaderCertificateSource {
    async fn client_certificate(
        &self,
        parts: &Parts,
    ) -> Result<Option<ClientCertificate>, ExtractError> {
        let Some(value) = parts.headers.get(&self.header) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|e| ExtractError::Malformed(e.to_string()))?
            .trim();
        if value.is_empty() {
            return Ok(None);
        }
        decode_header_value(value).map(Some)
    }
}

fn decode_header_value(value: &str) -> Result<ClientCertificate, ExtractError> {
    let decoded = if value.contains('%') {
        urlencoding::decode(value)
            .map_err(|e| ExtractError::Malformed(e.to_string()))?
            .into_owned()
    } else {
        value.to_string()
    };

    if decoded.contains("-----BEGIN") {
        return ClientCertificate::from_pem(&decoded)
            .map_err(|e| ExtractError::Malformed(e.to_string()));
    }

    let compact: String = decoded.chars().filter(|c| !c.is_whitespace()).collect();
    let der = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| ExtractError::Malformed(e.to_string()))?;
    Ok(ClientCertificate::from_der(der))
}
