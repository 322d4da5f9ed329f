use crate::error::{IdentityError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use x509_parser::prelude::*;

/// SHA-256 thumbprint of a certificate's DER encoding, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex digits in a rendered fingerprint.
    pub const HEX_LEN: usize = 64;

    /// Fingerprint of a DER encoding, or `None` for an empty encoding.
    pub fn of(der: &[u8]) -> Option<Self> {
        if der.is_empty() {
            return None;
        }
        Some(Self(hex::encode(Sha256::digest(der))))
    }

    /// Parse an operator-supplied fingerprint.
    ///
    /// Case, `:` separators and whitespace are ignored, so values copied from
    /// `openssl x509 -fingerprint -sha256` work as-is.
    pub fn parse(text: &str) -> Result<Self> {
        let normalized: String = text
            .chars()
            .filter(|c| *c != ':' && !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if normalized.len() != Self::HEX_LEN || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdentityError::InvalidFingerprint(text.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Client certificate presented by the peer.
///
/// Read-only input produced by the transport layer. Equality is full DER
/// equality of the leaf; two certificates sharing a fingerprint are not
/// interchangeable.
#[derive(Clone)]
pub struct ClientCertificate {
    der: Vec<u8>,
    intermediates: Vec<Vec<u8>>,
    fingerprint: Option<Fingerprint>,
}

impl ClientCertificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        let der = der.into();
        let fingerprint = Fingerprint::of(&der);
        Self {
            der,
            intermediates: Vec::new(),
            fingerprint,
        }
    }

    /// Build from a peer chain: leaf first, then intermediates.
    pub fn from_chain<I, C>(chain: I) -> Option<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let mut chain = chain.into_iter().map(Into::into);
        let leaf = chain.next()?;
        Some(Self::from_der(leaf).with_intermediates(chain.collect()))
    }

    /// Parse PEM text. The first CERTIFICATE block is the leaf, any further
    /// blocks are kept as intermediates.
    pub fn from_pem(text: &str) -> Result<Self> {
        let blocks = ::pem::parse_many(text).map_err(|e| IdentityError::InvalidPem(e.to_string()))?;
        let chain: Vec<Vec<u8>> = blocks
            .into_iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .map(::pem::Pem::into_contents)
            .collect();

        Self::from_chain(chain)
            .ok_or_else(|| IdentityError::InvalidPem("no CERTIFICATE block found".to_string()))
    }

    #[must_use]
    pub fn with_intermediates(mut self, intermediates: Vec<Vec<u8>>) -> Self {
        self.intermediates = intermediates;
        self
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn intermediates(&self) -> &[Vec<u8>] {
        &self.intermediates
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// Parse the certificate for display and audit purposes.
    pub fn info(&self) -> Result<CertificateInfo> {
        CertificateInfo::from_der(&self.der)
    }
}

impl PartialEq for ClientCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for ClientCertificate {}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("fingerprint", &self.fingerprint)
            .field("der_len", &self.der.len())
            .field("intermediates", &self.intermediates.len())
            .finish()
    }
}

/// Parsed certificate details used for logging and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    /// Full Subject Distinguished Name
    pub subject: String,
    /// Issuer Distinguished Name
    pub issuer: String,
    /// Serial number, colon-separated hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateInfo {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) =
            X509Certificate::from_der(der).map_err(|e| IdentityError::Parse(e.to_string()))?;

        let not_before = DateTime::<Utc>::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| IdentityError::Parse("not_before out of range".to_string()))?;
        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| IdentityError::Parse("not_after out of range".to_string()))?;

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.raw_serial_as_string(),
            not_before,
            not_after,
        })
    }
}
