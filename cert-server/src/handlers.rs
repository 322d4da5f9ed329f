use crate::error::ApiError;
use crate::server::CertGateServer;
use axum::{extract::{Request, State}, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Identity of the authenticated client
#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub fingerprint: Option<String>,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub intermediates: usize,
}

pub async fn health_check(State(server): State<CertGateServer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: server.started_at.elapsed().as_secs(),
    })
}

/// Describe the certificate that authenticated this request.
pub async fn whoami(
    State(server): State<CertGateServer>,
    request: Request,
) -> Result<Json<WhoAmIResponse>, ApiError> {
    let (parts, _) = request.into_parts();
    let certificate = server
        .gate
        .source()
        .client_certificate(&parts)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::authentication("no client certificate on this request"))?;

    let info = certificate
        .info()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(WhoAmIResponse {
        fingerprint: certificate.fingerprint().map(ToString::to_string),
        subject: info.subject,
        issuer: info.issuer,
        serial: info.serial,
        not_before: info.not_before,
        not_after: info.not_after,
        intermediates: certificate.intermediates().len(),
    }))
}
