//! Server-side TLS.
//!
//! The handshake asks every client for a certificate but never refuses one:
//! whether the certificate authenticates the request is decided per request
//! by the certificate gate, which can then answer with a proper 401.

use crate::error::ServerError;
use crate::settings::TlsSettings;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
    UnixTime,
};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme};
use std::path::Path;
use std::sync::Arc;

/// Client certificate verifier that defers the trust decision.
///
/// Only the handshake signature is checked, proving the client holds the
/// private key of the certificate it presented.
#[derive(Debug)]
pub struct DeferredClientVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl DeferredClientVerifier {
    pub fn new(algorithms: WebPkiSupportedAlgorithms) -> Self {
        Self { algorithms }
    }
}

impl ClientCertVerifier for DeferredClientVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Build the rustls configuration from the configured PEM files.
pub fn load_server_config(settings: &TlsSettings) -> Result<Arc<ServerConfig>, ServerError> {
    let cert_path = settings
        .cert
        .as_deref()
        .ok_or_else(|| ServerError::Tls("server.tls.cert is required".to_string()))?;
    let key_path = settings
        .key
        .as_deref()
        .ok_or_else(|| ServerError::Tls("server.tls.key is required".to_string()))?;

    let config = server_config(&read(cert_path)?, &read(key_path)?)?;
    tracing::info!(cert = %cert_path.display(), "Loaded TLS server certificate");
    Ok(config)
}

/// Build the rustls configuration from PEM text.
pub fn server_config(cert_pem: &str, key_pem: &str) -> Result<Arc<ServerConfig>, ServerError> {
    let provider = rustls::crypto::ring::default_provider();
    let verifier = DeferredClientVerifier::new(provider.signature_verification_algorithms);

    let mut config = ServerConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(Arc::new(verifier))
        .with_single_cert(parse_certificates(cert_pem)?, parse_private_key(key_pem)?)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn read(path: &Path) -> Result<String, ServerError> {
    std::fs::read_to_string(path).map_err(|source| ServerError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certificates(text: &str) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let certificates: Vec<CertificateDer<'static>> = pem::parse_many(text)
        .map_err(|e| ServerError::Tls(e.to_string()))?
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| CertificateDer::from(block.into_contents()))
        .collect();

    if certificates.is_empty() {
        return Err(ServerError::Tls("no CERTIFICATE block in server certificate file".to_string()));
    }
    Ok(certificates)
}

fn parse_private_key(text: &str) -> Result<PrivateKeyDer<'static>, ServerError> {
    for block in pem::parse_many(text).map_err(|e| ServerError::Tls(e.to_string()))? {
        let tag = block.tag().to_owned();
        let der = block.into_contents();
        let key = match tag.as_str() {
            "PRIVATE KEY" => PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der)),
            "RSA PRIVATE KEY" => PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(der)),
            "EC PRIVATE KEY" => PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(der)),
            _ => continue,
        };
        return Ok(key);
    }
    Err(ServerError::Tls("no private key found in key file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cert_identity::testing::TestAuthority;

    #[test]
    fn test_server_config_from_generated_identity() {
        let ca = TestAuthority::new("TLS Test CA");
        let (cert_pem, key_pem) = ca.issue_server("localhost");

        let config = server_config(&cert_pem, &key_pem).unwrap();

        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }

    #[test]
    fn test_verifier_accepts_any_presented_certificate() {
        let verifier = DeferredClientVerifier::new(
            rustls::crypto::ring::default_provider().signature_verification_algorithms,
        );
        let stranger = TestAuthority::new("Unknown CA").issue("stranger");

        let result = verifier.verify_client_cert(
            &CertificateDer::from(stranger.der().to_vec()),
            &[],
            UnixTime::now(),
        );
        assert!(result.is_ok());
        assert!(verifier.offer_client_auth());
        assert!(!verifier.client_auth_mandatory());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }

    #[test]
    fn test_missing_key_block() {
        let ca = TestAuthority::new("TLS Test CA");
        let (cert_pem, _) = ca.issue_server("localhost");

        let result = server_config(&cert_pem, &cert_pem);
        assert!(matches!(result, Err(ServerError::Tls(_))));
    }

    #[test]
    fn test_missing_paths() {
        let settings = TlsSettings::default();
        assert!(matches!(load_server_config(&settings), Err(ServerError::Tls(_))));
    }

    #[test]
    fn test_load_from_files() {
        let ca = TestAuthority::new("TLS Test CA");
        let (cert_pem, key_pem) = ca.issue_server("localhost");
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.pem");
        let key = dir.path().join("server.key");
        std::fs::write(&cert, cert_pem).unwrap();
        std::fs::write(&key, key_pem).unwrap();

        let settings = TlsSettings {
            enabled: true,
            cert: Some(cert),
            key: Some(key),
        };
        assert!(load_server_config(&settings).is_ok());
    }
}
