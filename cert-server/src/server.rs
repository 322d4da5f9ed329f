use crate::error::ServerError;
use crate::settings::Settings;
use cert_gateway::CertificateGate;
use cert_logging::SubjectRedactor;
use std::time::Instant;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct CertGateServer {
    pub gate: CertificateGate,
    pub started_at: Instant,
}

impl CertGateServer {
    pub fn new(gate: CertificateGate) -> Self {
        Self {
            gate,
            started_at: Instant::now(),
        }
    }

    /// Wire the gate from settings: verifier, trust store, certificate source.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServerError> {
        settings.gateway.validate()?;

        let validator = settings.identity.build_validator()?;
        let store = settings.identity.build_trust_store()?;
        let source = settings.gateway.build_source()?;

        let gate = CertificateGate::new(source, validator, store)
            .with_config(settings.gateway.clone())
            .with_redactor(SubjectRedactor::from_logger_config(&settings.logging));

        Ok(Self::new(gate))
    }
}
