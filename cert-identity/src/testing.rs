//! Certificate fixtures for tests.
//!
//! Everything here is generated on the fly with `rcgen`; nothing touches
//! disk unless the caller writes the PEM output somewhere.

#![allow(clippy::expect_used)]

use crate::models::ClientCertificate;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};

/// A throwaway certificate authority.
pub struct TestAuthority {
    cert: Certificate,
    key: KeyPair,
}

impl TestAuthority {
    /// Self-signed root CA with the given common name.
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().expect("generate CA key");
        let cert = ca_params(name)
            .self_signed(&key)
            .expect("self-sign CA certificate");
        Self { cert, key }
    }

    /// Intermediate CA issued by this authority.
    pub fn intermediate(&self, name: &str) -> Self {
        let key = KeyPair::generate().expect("generate intermediate key");
        let cert = ca_params(name)
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign intermediate certificate");
        Self { cert, key }
    }

    pub fn der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Client certificate valid for the rcgen default window (1975..4096).
    pub fn issue(&self, common_name: &str) -> ClientCertificate {
        self.issue_with(leaf_params(common_name))
    }

    /// Client certificate whose validity ended in 2001.
    pub fn issue_expired(&self, common_name: &str) -> ClientCertificate {
        let mut params = leaf_params(common_name);
        params.not_before = rcgen::date_time_ymd(2000, 1, 1);
        params.not_after = rcgen::date_time_ymd(2001, 1, 1);
        self.issue_with(params)
    }

    /// Client certificate that only becomes valid in 2999.
    pub fn issue_not_yet_valid(&self, common_name: &str) -> ClientCertificate {
        let mut params = leaf_params(common_name);
        params.not_before = rcgen::date_time_ymd(2999, 1, 1);
        params.not_after = rcgen::date_time_ymd(3000, 1, 1);
        self.issue_with(params)
    }

    /// Client certificate together with its private key in PKCS#8 PEM.
    pub fn issue_with_key(&self, common_name: &str) -> (ClientCertificate, String) {
        let key = KeyPair::generate().expect("generate leaf key");
        let cert = leaf_params(common_name)
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign leaf certificate");
        (ClientCertificate::from_der(cert.der().to_vec()), key.serialize_pem())
    }

    /// Server certificate for `host`, returned as (certificate PEM, key PEM).
    pub fn issue_server(&self, host: &str) -> (String, String) {
        let key = KeyPair::generate().expect("generate server key");
        let mut params =
            CertificateParams::new(vec![host.to_string()]).expect("server certificate params");
        params.distinguished_name.push(DnType::CommonName, host);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign server certificate");
        (cert.pem(), key.serialize_pem())
    }

    fn issue_with(&self, params: CertificateParams) -> ClientCertificate {
        let key = KeyPair::generate().expect("generate leaf key");
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign leaf certificate");
        ClientCertificate::from_der(cert.der().to_vec())
    }
}

/// Self-signed, non-CA client certificate.
pub fn self_signed(common_name: &str) -> ClientCertificate {
    let key = KeyPair::generate().expect("generate key");
    let cert = leaf_params(common_name)
        .self_signed(&key)
        .expect("self-sign certificate");
    ClientCertificate::from_der(cert.der().to_vec())
}

fn ca_params(name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
    params.distinguished_name.push(DnType::CommonName, name);
    params.distinguished_name.push(DnType::OrganizationName, "CertGate Test");
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params
}

fn leaf_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("leaf params");
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
}
