use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cert_identity::testing::TestAuthority;
use cert_identity::{
    CertificateValidator, CertificateVerifier, ChainVerifier, ClientCertificate,
    DirectoryTrustStore, Fingerprint, IdentityError, InMemoryTrustStore, NoTrustStore,
    RejectionReason, TrustStore, TrustStoreError, ValidationOutcome, VerifyError,
};

struct TestSetup {
    ca: TestAuthority,
    validator: CertificateValidator,
}

impl TestSetup {
    fn new() -> Self {
        let ca = TestAuthority::new("Validator Test CA");
        let validator = CertificateValidator::new(Arc::new(ChainVerifier::new(vec![ca.der()])));
        Self { ca, validator }
    }
}

/// Verifier that accepts anything, so trust-store behaviour can be isolated.
struct AcceptAll;

impl CertificateVerifier for AcceptAll {
    fn verify(&self, _certificate: &ClientCertificate) -> Result<(), VerifyError> {
        Ok(())
    }
}

/// Store that records lookups and always answers with a fixed set.
struct RecordingStore {
    lookups: AtomicUsize,
    answer: Option<Vec<ClientCertificate>>,
}

#[async_trait]
impl TrustStore for RecordingStore {
    async fn find_by_fingerprint(
        &self,
        _fingerprint: &Fingerprint,
    ) -> Result<Option<Vec<ClientCertificate>>, TrustStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

struct FailingStore;

#[async_trait]
impl TrustStore for FailingStore {
    async fn find_by_fingerprint(
        &self,
        _fingerprint: &Fingerprint,
    ) -> Result<Option<Vec<ClientCertificate>>, TrustStoreError> {
        Err(TrustStoreError::InternalError(anyhow::anyhow!("store offline")))
    }
}

#[tokio::test]
async fn test_missing_certificate_is_rejected() {
    let setup = TestSetup::new();

    let outcome = setup.validator.validate(None, &NoTrustStore).await;

    assert_eq!(outcome.rejection(), Some(RejectionReason::NoCertificatePresented));
}

#[tokio::test]
async fn test_untrusted_certificate_fails_verification() {
    let setup = TestSetup::new();
    let foreign = TestAuthority::new("Someone Else").issue("intruder");
    let store = InMemoryTrustStore::from_certificates([foreign.clone()]);

    let outcome = setup.validator.validate(Some(&foreign), &store).await;

    assert_eq!(
        outcome.rejection(),
        Some(RejectionReason::CryptographicVerificationFailed)
    );
}

#[tokio::test]
async fn test_expired_certificate_fails_verification() {
    let setup = TestSetup::new();
    let expired = setup.ca.issue_expired("expired-client");

    let outcome = setup.validator.validate(Some(&expired), &NoTrustStore).await;

    assert_eq!(
        outcome.rejection(),
        Some(RejectionReason::CryptographicVerificationFailed)
    );
}

#[tokio::test]
async fn test_future_certificate_fails_verification() {
    let setup = TestSetup::new();
    let early = setup.ca.issue_not_yet_valid("early-client");

    let outcome = setup.validator.validate(Some(&early), &NoTrustStore).await;

    assert_eq!(
        outcome.rejection(),
        Some(RejectionReason::CryptographicVerificationFailed)
    );
}

#[tokio::test]
async fn test_verification_failure_skips_trust_store() {
    let setup = TestSetup::new();
    let store = RecordingStore {
        lookups: AtomicUsize::new(0),
        answer: None,
    };
    let foreign = TestAuthority::new("Foreign").issue("intruder");

    setup.validator.validate(Some(&foreign), &store).await;

    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_matching_set_without_exact_certificate_is_rejected() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");
    let impostor = setup.ca.issue("impostor");
    let store = InMemoryTrustStore::new();
    store.register(presented.fingerprint().unwrap().clone(), impostor);

    let outcome = setup.validator.validate(Some(&presented), &store).await;

    assert_eq!(outcome.rejection(), Some(RejectionReason::NotInTrustStore));
}

#[tokio::test]
async fn test_absent_store_accepts() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");

    let outcome = setup.validator.validate(Some(&presented), &NoTrustStore).await;

    assert!(outcome.is_accepted());
}

#[tokio::test]
async fn test_empty_result_set_accepts() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");
    let store = InMemoryTrustStore::from_certificates([setup.ca.issue("someone-else")]);

    let outcome = setup.validator.validate(Some(&presented), &store).await;

    assert!(outcome.is_accepted());
}

#[tokio::test]
async fn test_registered_certificate_accepts() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");
    let store = InMemoryTrustStore::new();
    let fp = presented.fingerprint().unwrap().clone();
    store.register(fp.clone(), setup.ca.issue("sibling"));
    store.register(fp, presented.clone());

    let outcome = setup.validator.validate(Some(&presented), &store).await;

    assert!(outcome.is_accepted());
}

#[tokio::test]
async fn test_certificate_without_fingerprint_skips_store() {
    let validator = CertificateValidator::new(Arc::new(AcceptAll));
    let store = RecordingStore {
        lookups: AtomicUsize::new(0),
        answer: Some(vec![TestAuthority::new("Any").issue("other")]),
    };
    let empty = ClientCertificate::from_der(Vec::new());

    let outcome = validator.validate(Some(&empty), &store).await;

    assert!(outcome.is_accepted());
    assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_store_fault_is_an_error_not_a_rejection() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");

    let outcome = setup.validator.validate(Some(&presented), &FailingStore).await;

    assert!(matches!(
        outcome,
        ValidationOutcome::Error(IdentityError::TrustStore(TrustStoreError::InternalError(_)))
    ));
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");
    let mismatch = InMemoryTrustStore::new();
    mismatch.register(presented.fingerprint().unwrap().clone(), setup.ca.issue("other"));
    let registered = InMemoryTrustStore::from_certificates([presented.clone()]);

    for _ in 0..2 {
        assert_eq!(
            setup.validator.validate(Some(&presented), &mismatch).await.rejection(),
            Some(RejectionReason::NotInTrustStore)
        );
        assert!(setup
            .validator
            .validate(Some(&presented), &registered)
            .await
            .is_accepted());
        assert!(setup
            .validator
            .validate(Some(&presented), &NoTrustStore)
            .await
            .is_accepted());
    }
}

#[tokio::test]
async fn test_directory_store_end_to_end() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("directory-client");
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("client.pem"),
        pem::encode(&pem::Pem::new("CERTIFICATE", presented.der().to_vec())),
    )
    .unwrap();
    let store = DirectoryTrustStore::new(dir.path());

    let outcome = setup.validator.validate(Some(&presented), &store).await;
    assert!(outcome.is_accepted());

    let stranger = setup.ca.issue("stranger");
    let outcome = setup.validator.validate(Some(&stranger), &store).await;
    assert!(outcome.is_accepted());
    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_missing_store_directory_is_an_error() {
    let setup = TestSetup::new();
    let presented = setup.ca.issue("presented");
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryTrustStore::new(dir.path().join("missing"));

    let outcome = setup.validator.validate(Some(&presented), &store).await;

    assert!(matches!(
        outcome,
        ValidationOutcome::Error(IdentityError::TrustStore(TrustStoreError::Unavailable { .. }))
    ));
    assert_eq!(store.active_sessions(), 0);
}

#[tokio::test]
async fn test_chain_with_intermediate_is_accepted() {
    let setup = TestSetup::new();
    let intermediate = setup.ca.intermediate("Validator Intermediate");
    let presented = intermediate
        .issue("chained")
        .with_intermediates(vec![intermediate.der()]);

    let outcome = setup.validator.validate(Some(&presented), &NoTrustStore).await;

    assert!(outcome.is_accepted());
}
