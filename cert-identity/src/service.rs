use crate::{error::*, models::*, repository::*, verifier::*};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NoCertificatePresented,
    CryptographicVerificationFailed,
    NotInTrustStore,
}

impl RejectionReason {
    pub const NO_CERTIFICATE_MESSAGE: &'static str = "Certificate cannot be found in the request.";
    pub const INVALID_CERTIFICATE_MESSAGE: &'static str = "Invalid client certificate.";

    /// User-facing response body for this rejection.
    ///
    /// Trust-store mismatches share the generic invalid-certificate text.
    pub fn message(self) -> &'static str {
        match self {
            Self::NoCertificatePresented => Self::NO_CERTIFICATE_MESSAGE,
            Self::CryptographicVerificationFailed | Self::NotInTrustStore => {
                Self::INVALID_CERTIFICATE_MESSAGE
            }
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoCertificatePresented => "no client certificate presented",
            Self::CryptographicVerificationFailed => "client certificate failed verification",
            Self::NotInTrustStore => "client certificate is not in the trust store",
        })
    }
}

/// Result of authenticating one request. Computed fresh every time.
#[derive(Debug)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(RejectionReason),
    Error(IdentityError),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Accept/reject decision for presented client certificates.
#[derive(Clone)]
pub struct CertificateValidator {
    verifier: Arc<dyn CertificateVerifier>,
}

impl CertificateValidator {
    pub fn new(verifier: Arc<dyn CertificateVerifier>) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &Arc<dyn CertificateVerifier> {
        &self.verifier
    }

    /// Decide whether `certificate` authenticates the request.
    ///
    /// Only a non-empty result set that excludes this exact certificate
    /// rejects on trust-store grounds. No result set, an empty one, or a
    /// certificate without a fingerprint all pass that step. Store faults
    /// come back as `ValidationOutcome::Error`.
    pub async fn validate(
        &self,
        certificate: Option<&ClientCertificate>,
        store: &dyn TrustStore,
    ) -> ValidationOutcome {
        let Some(certificate) = certificate else {
            tracing::debug!("No client certificate presented");
            return ValidationOutcome::Rejected(RejectionReason::NoCertificatePresented);
        };

        if let Err(error) = self.verifier.verify(certificate) {
            tracing::warn!(
                fingerprint = ?certificate.fingerprint().map(Fingerprint::as_str),
                %error,
                "Client certificate failed verification"
            );
            return ValidationOutcome::Rejected(RejectionReason::CryptographicVerificationFailed);
        }

        let Some(fingerprint) = certificate.fingerprint() else {
            tracing::debug!("Certificate has no fingerprint, skipping trust store lookup");
            return ValidationOutcome::Accepted;
        };

        match store.find_by_fingerprint(fingerprint).await {
            Ok(Some(entries)) if !entries.is_empty() && !entries.contains(certificate) => {
                tracing::warn!(
                    %fingerprint,
                    entries = entries.len(),
                    "Trust store entries do not include the presented certificate"
                );
                ValidationOutcome::Rejected(RejectionReason::NotInTrustStore)
            }
            Ok(entries) => {
                tracing::debug!(
                    %fingerprint,
                    entries = entries.as_ref().map(Vec::len),
                    "Trust store check passed"
                );
                ValidationOutcome::Accepted
            }
            Err(error) => ValidationOutcome::Error(error.into()),
        }
    }
}

impl fmt::Debug for CertificateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateValidator").finish_non_exhaustive()
    }
}
