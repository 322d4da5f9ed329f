//! The certificate gate.
//!
//! Every request goes through `Extracting -> Validating` and ends in exactly
//! one of: forwarded to the next stage, answered with 401, or answered on the
//! failure path. Nothing is retried and nothing is cached between requests.

use crate::cancellation::RequestCancellation;
use crate::config::GatewayConfig;
use crate::error::GateError;
use crate::response;
use crate::source::CertificateSource;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use cert_identity::{CertificateValidator, ClientCertificate, TrustStore, ValidationOutcome};
use cert_logging::SubjectRedactor;
use http::request::Parts;
use std::future::Future;
use std::sync::Arc;

/// Shared gate state. Cloning is cheap.
#[derive(Clone)]
pub struct CertificateGate {
    source: Arc<dyn CertificateSource>,
    validator: CertificateValidator,
    store: Arc<dyn TrustStore>,
    config: Arc<GatewayConfig>,
    redactor: SubjectRedactor,
}

impl CertificateGate {
    pub fn new(
        source: Arc<dyn CertificateSource>,
        validator: CertificateValidator,
        store: Arc<dyn TrustStore>,
    ) -> Self {
        Self {
            source,
            validator,
            store,
            config: Arc::new(GatewayConfig::default()),
            redactor: SubjectRedactor::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    #[must_use]
    pub fn with_redactor(mut self, redactor: SubjectRedactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn CertificateSource> {
        &self.source
    }

    /// Authenticate `request` and either hand it to `next` or answer it.
    ///
    /// `next` is called at most once, with the request exactly as received.
    pub async fn handle<F, Fut>(&self, request: Request, next: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let cancellation = request
            .extensions()
            .get::<RequestCancellation>()
            .cloned()
            .unwrap_or_default();
        let (parts, body) = request.into_parts();

        let decision = tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(GateError::Cancelled),
            decision = self.authenticate(&parts) => decision,
        };

        match decision {
            Ok((ValidationOutcome::Accepted, certificate)) => {
                self.log_accepted(&parts, certificate.as_ref());
                next(Request::from_parts(parts, body)).await
            }
            Ok((ValidationOutcome::Rejected(reason), _)) => {
                tracing::error!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    %reason,
                    "Client certificate rejected"
                );
                response::rejection(reason, &self.config)
            }
            Ok((ValidationOutcome::Error(error), _)) => {
                self.fail(&parts, &GateError::Validation(error))
            }
            Err(GateError::Cancelled) => {
                tracing::warn!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    "Request cancelled during client certificate authentication"
                );
                response::fault(&GateError::Cancelled, &self.config)
            }
            Err(error) => self.fail(&parts, &error),
        }
    }

    async fn authenticate(
        &self,
        parts: &Parts,
    ) -> Result<(ValidationOutcome, Option<ClientCertificate>), GateError> {
        let certificate = self.source.client_certificate(parts).await.map_err(|error| {
            tracing::error!(%error, "Failed to obtain client certificate");
            error
        })?;
        let outcome = self
            .validator
            .validate(certificate.as_ref(), self.store.as_ref())
            .await;
        Ok((outcome, certificate))
    }

    fn log_accepted(&self, parts: &Parts, certificate: Option<&ClientCertificate>) {
        if !self.config.log_certificates {
            tracing::info!(path = %parts.uri.path(), "Client certificate validated");
            return;
        }
        let fingerprint = certificate.and_then(ClientCertificate::fingerprint);
        let subject = certificate
            .and_then(|c| c.info().ok())
            .map(|info| self.redactor.redact(&info.subject));
        tracing::info!(
            path = %parts.uri.path(),
            fingerprint = ?fingerprint.map(|fp| fp.as_str()),
            subject = ?subject,
            "Client certificate validated"
        );
    }

    fn fail(&self, parts: &Parts, error: &GateError) -> Response {
        tracing::error!(
            method = %parts.method,
            path = %parts.uri.path(),
            %error,
            "Client certificate authentication failed"
        );
        response::fault(error, &self.config)
    }
}

/// axum middleware running [`CertificateGate::handle`].
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/api/v1/whoami", get(whoami))
///     .route_layer(axum::middleware::from_fn_with_state(gate, certificate_gate));
/// ```
pub async fn certificate_gate(
    State(gate): State<CertificateGate>,
    request: Request,
    next: Next,
) -> Response {
    gate.handle(request, |request| next.run(request)).await
}
