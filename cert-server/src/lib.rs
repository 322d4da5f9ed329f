//! CertGate server - mutual TLS client certificate authentication
//!
//! Terminates TLS, hands each request's peer certificates to the
//! certificate gate and serves the gated API behind it.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod serve;
pub mod server;
pub mod settings;
pub mod tls;

pub use error::*;
pub use serve::serve;
pub use server::CertGateServer;
pub use settings::Settings;

use tower_http::trace::TraceLayer;

/// Create the application router with all routes and middleware
pub fn create_app(server: CertGateServer) -> axum::Router {
    routes::create_routes(&server)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}
