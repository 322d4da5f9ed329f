use crate::{error::*, models::*, repository::*, service::*, verifier::*};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub verifier: VerifierConfig,
    pub trust_store: TrustStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// PEM bundle of CA certificates client chains must end in
    pub ca_bundle: Option<PathBuf>,
    pub max_chain_depth: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            ca_bundle: None,
            max_chain_depth: ChainVerifier::DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustStoreKind {
    Directory,
    Memory,
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustStoreConfig {
    pub kind: TrustStoreKind,
    /// Store directory (kind = directory)
    pub path: Option<PathBuf>,
    /// PEM files loaded into the allow-list (kind = memory)
    pub certificates: Vec<PathBuf>,
    pub valid_only: bool,
}

impl Default for TrustStoreConfig {
    fn default() -> Self {
        Self {
            kind: TrustStoreKind::None,
            path: None,
            certificates: Vec::new(),
            valid_only: true,
        }
    }
}

impl IdentityConfig {
    /// Build the validator from the configured CA bundle.
    pub fn build_validator(&self) -> Result<CertificateValidator> {
        if self.verifier.max_chain_depth == 0 {
            return Err(IdentityError::Config(
                "verifier.max_chain_depth must be at least 1".to_string(),
            ));
        }
        let bundle = self.verifier.ca_bundle.as_ref().ok_or_else(|| {
            IdentityError::Config("verifier.ca_bundle is required".to_string())
        })?;

        let verifier = ChainVerifier::from_pem_bundle(bundle)?
            .with_max_chain_depth(self.verifier.max_chain_depth);
        Ok(CertificateValidator::new(Arc::new(verifier)))
    }

    pub fn build_trust_store(&self) -> Result<Arc<dyn TrustStore>> {
        let config = &self.trust_store;
        match config.kind {
            TrustStoreKind::None => Ok(Arc::new(NoTrustStore)),
            TrustStoreKind::Directory => {
                let path = config.path.clone().ok_or_else(|| {
                    IdentityError::Config(
                        "trust_store.path is required for a directory store".to_string(),
                    )
                })?;
                tracing::info!(
                    path = %path.display(),
                    valid_only = config.valid_only,
                    "Using directory trust store"
                );
                Ok(Arc::new(DirectoryTrustStore::new(path).valid_only(config.valid_only)))
            }
            TrustStoreKind::Memory => {
                let store = InMemoryTrustStore::new();
                for path in &config.certificates {
                    let text = std::fs::read_to_string(path).map_err(|source| IdentityError::Read {
                        path: path.clone(),
                        source,
                    })?;
                    let certificate = ClientCertificate::from_pem(&text)?;
                    if store.insert(certificate).is_none() {
                        tracing::warn!(
                            path = %path.display(),
                            "Allow-list certificate has no fingerprint"
                        );
                    }
                }
                tracing::info!(entries = store.len(), "Using in-memory trust store");
                Ok(Arc::new(store))
            }
        }
    }
}
