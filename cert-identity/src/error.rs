use std::path::PathBuf;
use thiserror::Error;

/// Reasons a certificate fails cryptographic verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Malformed certificate: {0}")]
    Malformed(String),

    #[error("Certificate is not yet valid")]
    NotYetValid,

    #[error("Certificate has expired")]
    Expired,

    #[error("No trusted issuer found for {0}")]
    UntrustedIssuer(String),

    #[error("Certificate chain exceeds {0} links")]
    ChainTooLong(usize),

    #[error("Invalid trust anchor: {0}")]
    InvalidAnchor(String),
}

/// Faults raised while reading a trust store.
///
/// These are never rejections: they travel to the gate's failure path.
#[derive(Error, Debug)]
pub enum TrustStoreError {
    #[error("Trust store {path} cannot be opened: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Trust store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Invalid PEM data: {0}")]
    InvalidPem(String),

    #[error("Failed to parse X.509 certificate: {0}")]
    Parse(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid identity configuration: {0}")]
    Config(String),

    #[error(transparent)]
    TrustStore(#[from] TrustStoreError),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
