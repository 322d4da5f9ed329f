//! Client certificate gate for axum
//!
//! Authenticates mutually-authenticated requests before they reach
//! application handlers:
//! - [`CertificateSource`] finds the presented certificate (TLS peer or proxy header)
//! - [`CertificateGate`] validates it and forwards or answers the request
//! - [`RequestCancellation`] ties extraction and validation to the request lifetime
//!
//! Rejections are answered with `401` and one of two fixed plain-text
//! messages. Unexpected failures write the error text into the body.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod source;

pub use cancellation::*;
pub use config::*;
pub use error::*;
pub use middleware::*;
pub use source::*;
