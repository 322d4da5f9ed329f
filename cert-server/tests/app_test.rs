use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use cert_gateway::{CertificateGate, PeerCertificateSource, PeerCertificates};
use cert_identity::testing::TestAuthority;
use cert_identity::{
    CertificateValidator, ChainVerifier, ClientCertificate, IdentityError, InMemoryTrustStore,
    TrustStoreKind,
};
use cert_server::{create_app, CertGateServer, ServerError, Settings};

const NO_CERTIFICATE: &str = "Certificate cannot be found in the request.";
const INVALID_CERTIFICATE: &str = "Invalid client certificate.";

fn app_with(ca: &TestAuthority, store: InMemoryTrustStore) -> Router {
    let validator = CertificateValidator::new(Arc::new(ChainVerifier::new(vec![ca.der()])));
    let gate = CertificateGate::new(Arc::new(PeerCertificateSource), validator, Arc::new(store));
    create_app(CertGateServer::new(gate))
}

fn whoami(peer: Option<&ClientCertificate>) -> Request<Body> {
    let mut request = Request::builder()
        .uri("/api/v1/whoami")
        .body(Body::empty())
        .unwrap();
    let chain = peer.map(|cert| vec![cert.der().to_vec()]).unwrap_or_default();
    request.extensions_mut().insert(PeerCertificates::new(chain));
    request
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_is_not_gated() {
    let ca = TestAuthority::new("App Test CA");
    let app = app_with(&ca, InMemoryTrustStore::new());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_whoami_describes_registered_client() {
    let ca = TestAuthority::new("App Test CA");
    let client = ca.issue("alice");
    let app = app_with(&ca, InMemoryTrustStore::from_certificates([client.clone()]));

    let response = app.oneshot(whoami(Some(&client))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        json["fingerprint"],
        client.fingerprint().unwrap().to_string()
    );
    assert!(json["subject"].as_str().unwrap().contains("alice"));
    assert!(json["issuer"].as_str().unwrap().contains("App Test CA"));
    assert_eq!(json["intermediates"], 0);
}

#[tokio::test]
async fn test_whoami_with_empty_store_accepts_any_chained_client() {
    let ca = TestAuthority::new("App Test CA");
    let app = app_with(&ca, InMemoryTrustStore::new());

    let response = app.oneshot(whoami(Some(&ca.issue("bob")))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_whoami_without_certificate() {
    let ca = TestAuthority::new("App Test CA");
    let app = app_with(&ca, InMemoryTrustStore::new());

    let response = app.oneshot(whoami(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, NO_CERTIFICATE);
}

#[tokio::test]
async fn test_whoami_with_foreign_certificate() {
    let ca = TestAuthority::new("App Test CA");
    let stranger = TestAuthority::new("Other CA").issue("mallory");
    let app = app_with(&ca, InMemoryTrustStore::new());

    let response = app.oneshot(whoami(Some(&stranger))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, INVALID_CERTIFICATE);
}

#[tokio::test]
async fn test_whoami_with_certificate_missing_from_store_is_accepted() {
    let ca = TestAuthority::new("App Test CA");
    let registered = ca.issue("alice");
    let app = app_with(&ca, InMemoryTrustStore::from_certificates([registered]));

    let response = app.oneshot(whoami(Some(&ca.issue("carol")))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_whoami_with_fingerprint_bound_to_another_certificate() {
    let ca = TestAuthority::new("App Test CA");
    let presented = ca.issue("carol");
    let store = InMemoryTrustStore::new();
    store.register(presented.fingerprint().unwrap().clone(), ca.issue("alice"));
    let app = app_with(&ca, store);

    let response = app.oneshot(whoami(Some(&presented))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, INVALID_CERTIFICATE);
}

#[tokio::test]
async fn test_whoami_without_transport_support() {
    let ca = TestAuthority::new("App Test CA");
    let app = app_with(&ca, InMemoryTrustStore::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/whoami")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Client certificate feature is not available on this connection."
    );
}

#[tokio::test]
async fn test_server_from_settings() {
    let ca = TestAuthority::new("Settings CA");
    let client = ca.issue("alice");
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("ca.pem");
    let allowed = dir.path().join("alice.pem");
    std::fs::write(&bundle, ca.pem()).unwrap();
    std::fs::write(
        &allowed,
        pem::encode(&pem::Pem::new("CERTIFICATE", client.der().to_vec())),
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.identity.verifier.ca_bundle = Some(bundle);
    settings.identity.trust_store.kind = TrustStoreKind::Memory;
    settings.identity.trust_store.certificates = vec![allowed];

    let app = create_app(CertGateServer::from_settings(&settings).unwrap());

    let accepted = app.clone().oneshot(whoami(Some(&client))).await.unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);

    let unlisted = app.clone().oneshot(whoami(Some(&ca.issue("eve")))).await.unwrap();
    assert_eq!(unlisted.status(), StatusCode::OK);

    let foreign = TestAuthority::new("Other CA").issue("mallory");
    let rejected = app.oneshot(whoami(Some(&foreign))).await.unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_server_from_settings_requires_ca_bundle() {
    let result = CertGateServer::from_settings(&Settings::default());
    assert!(matches!(
        result,
        Err(ServerError::Identity(IdentityError::Config(_)))
    ));
}
