//! Translation of gate decisions into HTTP responses.

use crate::config::GatewayConfig;
use crate::error::GateError;
use axum::response::{IntoResponse, Response};
use cert_identity::RejectionReason;
use http::StatusCode;

/// Body for trust-store mismatches when they are reported separately.
pub const NOT_IN_TRUST_STORE_MESSAGE: &str =
    "Client certificate is not registered in the trust store.";

/// 401 with a plain-text body naming the reason.
pub fn rejection(reason: RejectionReason, config: &GatewayConfig) -> Response {
    let message = match reason {
        RejectionReason::NotInTrustStore if config.distinct_trust_store_message => {
            NOT_IN_TRUST_STORE_MESSAGE
        }
        _ => reason.message(),
    };
    (StatusCode::UNAUTHORIZED, message).into_response()
}

/// Failure-path response: the error text as body.
///
/// The status stays at the framework default unless `fault_status` is set.
pub fn fault(error: &GateError, config: &GatewayConfig) -> Response {
    let mut response = error.to_string().into_response();
    if let Ok(Some(status)) = config.fault_status_code() {
        *response.status_mut() = status;
    }
    response
}
