use crate::error::TrustStoreError;
use crate::models::{ClientCertificate, Fingerprint};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use x509_parser::prelude::*;

/// Read-only lookup of authorized certificates by fingerprint.
///
/// `Ok(None)` means the store produced no result set at all, `Ok(Some(set))`
/// is a result set that may be empty, and `Err` is a fault.
#[async_trait]
pub trait TrustStore: Send + Sync {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Vec<ClientCertificate>>, TrustStoreError>;
}

/// Store without a backing set. Every lookup yields no result set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrustStore;

#[async_trait]
impl TrustStore for NoTrustStore {
    async fn find_by_fingerprint(
        &self,
        _fingerprint: &Fingerprint,
    ) -> Result<Option<Vec<ClientCertificate>>, TrustStoreError> {
        Ok(None)
    }
}

// In-memory store for allow-lists and tests
#[derive(Debug, Default)]
pub struct InMemoryTrustStore {
    entries: RwLock<HashMap<Fingerprint, Vec<ClientCertificate>>>,
}

impl InMemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_certificates(certificates: impl IntoIterator<Item = ClientCertificate>) -> Self {
        let store = Self::new();
        for certificate in certificates {
            store.insert(certificate);
        }
        store
    }

    /// Register a certificate under its own fingerprint.
    ///
    /// Returns the fingerprint, or `None` when the certificate has none and
    /// therefore can never be looked up.
    pub fn insert(&self, certificate: ClientCertificate) -> Option<Fingerprint> {
        let fingerprint = certificate.fingerprint()?.clone();
        self.register(fingerprint.clone(), certificate);
        Some(fingerprint)
    }

    /// Register a certificate under an arbitrary fingerprint.
    pub fn register(&self, fingerprint: Fingerprint, certificate: ClientCertificate) {
        let mut entries = self.entries.write();
        let set = entries.entry(fingerprint).or_default();
        if !set.contains(&certificate) {
            set.push(certificate);
        }
    }

    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<Vec<ClientCertificate>> {
        self.entries.write().remove(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl TrustStore for InMemoryTrustStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Vec<ClientCertificate>>, TrustStoreError> {
        Ok(Some(
            self.entries.read().get(fingerprint).cloned().unwrap_or_default(),
        ))
    }
}

/// Directory-backed store of `.pem`, `.crt`, `.cer` and `.der` files.
///
/// The directory is opened read-only for every lookup and must already
/// exist. A PEM file may bundle several certificates.
#[derive(Debug, Clone)]
pub struct DirectoryTrustStore {
    path: PathBuf,
    valid_only: bool,
    active_sessions: Arc<AtomicUsize>,
}

impl DirectoryTrustStore {
    const EXTENSIONS: [&'static str; 4] = ["pem", "crt", "cer", "der"];

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            valid_only: true,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Only return certificates inside their validity window (default).
    #[must_use]
    pub fn valid_only(mut self, valid_only: bool) -> Self {
        self.valid_only = valid_only;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sessions currently holding the directory open.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    async fn open(&self) -> Result<StoreSession<'_>, TrustStoreError> {
        let unavailable = |source| TrustStoreError::Unavailable {
            path: self.path.clone(),
            source,
        };

        let metadata = tokio::fs::metadata(&self.path).await.map_err(unavailable)?;
        if !metadata.is_dir() {
            return Err(unavailable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a directory",
            )));
        }
        let entries = tokio::fs::read_dir(&self.path).await.map_err(unavailable)?;

        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(path = %self.path.display(), "Trust store session opened");
        Ok(StoreSession {
            path: &self.path,
            entries,
            active: &self.active_sessions,
        })
    }
}

#[async_trait]
impl TrustStore for DirectoryTrustStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Vec<ClientCertificate>>, TrustStoreError> {
        let mut session = self.open().await?;
        let matches = session.find(fingerprint, self.valid_only).await?;
        Ok(Some(matches))
    }
}

/// Open handle on a directory store, released when dropped.
struct StoreSession<'a> {
    path: &'a Path,
    entries: tokio::fs::ReadDir,
    active: &'a AtomicUsize,
}

impl StoreSession<'_> {
    async fn find(
        &mut self,
        fingerprint: &Fingerprint,
        valid_only: bool,
    ) -> Result<Vec<ClientCertificate>, TrustStoreError> {
        let mut matches = Vec::new();

        while let Some(entry) = self.entries.next_entry().await? {
            let file = entry.path();
            let Some(extension) = file
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
            else {
                continue;
            };
            if !DirectoryTrustStore::EXTENSIONS.contains(&extension.as_str()) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let bytes = tokio::fs::read(&file).await?;
            for der in decode_file(&bytes, extension == "der") {
                if Fingerprint::of(&der).as_ref() != Some(fingerprint) {
                    continue;
                }
                if valid_only && !currently_valid(&der) {
                    tracing::debug!(
                        file = %file.display(),
                        "Skipping trust store entry outside its validity window"
                    );
                    continue;
                }
                let certificate = ClientCertificate::from_der(der);
                if !matches.contains(&certificate) {
                    matches.push(certificate);
                }
            }
        }

        Ok(matches)
    }
}

impl Drop for StoreSession<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(path = %self.path.display(), "Trust store session released");
    }
}

/// Certificates held by a store file. PEM text yields its CERTIFICATE
/// blocks; anything else is taken as a single DER certificate.
fn decode_file(bytes: &[u8], der: bool) -> Vec<Vec<u8>> {
    if der {
        return vec![bytes.to_vec()];
    }
    let certificates: Vec<Vec<u8>> = std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| ::pem::parse_many(text).ok())
        .map(|blocks| {
            blocks
                .into_iter()
                .filter(|block| block.tag() == "CERTIFICATE")
                .map(::pem::Pem::into_contents)
                .collect()
        })
        .unwrap_or_default();
    if certificates.is_empty() {
        vec![bytes.to_vec()]
    } else {
        certificates
    }
}

fn currently_valid(der: &[u8]) -> bool {
    X509Certificate::from_der(der).is_ok_and(|(_, cert)| cert.validity().is_valid())
}
