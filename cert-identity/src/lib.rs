//! Client certificate identity for CertGate
//!
//! This crate owns the authentication decision for mutually-authenticated
//! requests:
//! - Certificate model and SHA-256 fingerprints
//! - Cryptographic verification (chain of trust and validity window)
//! - Trust-store lookups keyed by fingerprint
//! - The validator that turns all of the above into a `ValidationOutcome`
//!
//! # Example
//!
//! ```rust,no_run
//! use cert_identity::{CertificateValidator, ChainVerifier, ClientCertificate, NoTrustStore};
//! use std::sync::Arc;
//!
//! # async fn run(ca_der: Vec<u8>, presented: Option<ClientCertificate>) {
//! let validator = CertificateValidator::new(Arc::new(ChainVerifier::new(vec![ca_der])));
//!
//! let outcome = validator.validate(presented.as_ref(), &NoTrustStore).await;
//! if outcome.is_accepted() {
//!     // forward the request
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::*;
pub use error::*;
pub use models::*;
pub use repository::*;
pub use service::*;
pub use verifier::*;
