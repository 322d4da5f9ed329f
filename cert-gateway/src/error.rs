use cert_identity::IdentityError;
use thiserror::Error;

/// Failures while obtaining the client certificate from a request.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Client certificate feature is not available on this connection.")]
    TransportUnavailable,

    #[error("Client certificate could not be decoded: {0}")]
    Malformed(String),
}

/// Faults that end a request on the gate's failure path.
///
/// Rejections are not errors; they never appear here.
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("The request was cancelled during client certificate authentication.")]
    Cancelled,

    #[error(transparent)]
    Validation(#[from] IdentityError),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
