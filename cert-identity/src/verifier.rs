//! Cryptographic verification of presented client certificates.
//!
//! Mirrors a platform "basic verification" policy: the certificate must be
//! well-formed, inside its validity window and chain to a configured trust
//! anchor. No key-usage or custom policy checks are applied.

use crate::error::{IdentityError, Result, VerifyError};
use crate::models::ClientCertificate;
use chrono::{DateTime, Utc};
use std::path::Path;
use x509_parser::prelude::*;

/// Decides whether a certificate is cryptographically sound.
pub trait CertificateVerifier: Send + Sync {
    fn verify(&self, certificate: &ClientCertificate) -> std::result::Result<(), VerifyError>;
}

/// Chain-of-trust verifier over a fixed set of trust anchors.
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    anchors: Vec<Vec<u8>>,
    max_chain_depth: usize,
    verification_time: Option<i64>,
}

impl ChainVerifier {
    pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

    /// Create a verifier trusting the given DER-encoded anchors.
    pub fn new(anchors: Vec<Vec<u8>>) -> Self {
        Self {
            anchors,
            max_chain_depth: Self::DEFAULT_MAX_CHAIN_DEPTH,
            verification_time: None,
        }
    }

    /// Load trust anchors from a PEM bundle.
    ///
    /// Every CERTIFICATE block must parse; a bundle without any is rejected
    /// so a misconfigured path cannot silently trust nothing.
    pub fn from_pem_bundle(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| IdentityError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let blocks =
            ::pem::parse_many(&text).map_err(|e| IdentityError::InvalidPem(e.to_string()))?;

        let mut anchors = Vec::new();
        for block in blocks.into_iter().filter(|b| b.tag() == "CERTIFICATE") {
            X509Certificate::from_der(block.contents())
                .map_err(|e| IdentityError::Parse(format!("{}: {}", path.display(), e)))?;
            anchors.push(block.into_contents());
        }

        if anchors.is_empty() {
            return Err(IdentityError::Config(format!(
                "CA bundle {} contains no certificates",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), anchors = anchors.len(), "Loaded trust anchors");
        Ok(Self::new(anchors))
    }

    #[must_use]
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Pin the verification time instead of using the current clock.
    #[must_use]
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.verification_time = Some(time.timestamp());
        self
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    fn now(&self) -> std::result::Result<ASN1Time, VerifyError> {
        match self.verification_time {
            Some(secs) => ASN1Time::from_timestamp(secs)
                .map_err(|e| VerifyError::Malformed(format!("verification time: {e}"))),
            None => Ok(ASN1Time::now()),
        }
    }
}

impl CertificateVerifier for ChainVerifier {
    fn verify(&self, certificate: &ClientCertificate) -> std::result::Result<(), VerifyError> {
        let now = self.now()?;

        let (_, leaf) = X509Certificate::from_der(certificate.der())
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;
        check_validity(&leaf, now)?;

        let anchors: Vec<X509Certificate<'_>> = self
            .anchors
            .iter()
            .filter_map(|der| X509Certificate::from_der(der).ok().map(|(_, cert)| cert))
            .collect();

        // Presented intermediates that cannot act as an issuer are never candidates.
        let mut pool: Vec<X509Certificate<'_>> = certificate
            .intermediates()
            .iter()
            .filter_map(|der| X509Certificate::from_der(der).ok().map(|(_, cert)| cert))
            .filter(|cert| is_ca(cert) && check_validity(cert, now).is_ok())
            .collect();

        let mut current = leaf;
        for _ in 0..self.max_chain_depth {
            if anchors
                .iter()
                .any(|anchor| check_validity(anchor, now).is_ok() && issued_by(&current, anchor))
            {
                return Ok(());
            }

            match pool.iter().position(|candidate| issued_by(&current, candidate)) {
                Some(index) => current = pool.swap_remove(index),
                None => return Err(VerifyError::UntrustedIssuer(current.issuer().to_string())),
            }
        }

        Err(VerifyError::ChainTooLong(self.max_chain_depth))
    }
}

fn check_validity(
    cert: &X509Certificate<'_>,
    now: ASN1Time,
) -> std::result::Result<(), VerifyError> {
    let validity = cert.validity();
    if now < validity.not_before {
        return Err(VerifyError::NotYetValid);
    }
    if now > validity.not_after {
        return Err(VerifyError::Expired);
    }
    Ok(())
}

fn is_ca(cert: &X509Certificate<'_>) -> bool {
    matches!(cert.basic_constraints(), Ok(Some(ext)) if ext.value.ca)
}

fn issued_by(child: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    child.issuer().as_raw() == issuer.subject().as_raw()
        && child.verify_signature(Some(issuer.public_key())).is_ok()
}
