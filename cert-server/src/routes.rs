use crate::handlers;
use crate::server::CertGateServer;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use cert_gateway::certificate_gate;

/// `/health` is open; everything under `/api/v1` sits behind the gate.
pub fn create_routes(server: &CertGateServer) -> Router<CertGateServer> {
    let api = Router::new()
        .route("/whoami", get(handlers::whoami))
        .route_layer(from_fn_with_state(server.gate.clone(), certificate_gate));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api)
}
