use crate::config::LoggerConfig;
use base64::{engine::general_purpose, Engine as _};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

mod patterns {
    #![allow(clippy::expect_used)]

    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        pub static ref EMAIL: Regex =
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("email pattern");
        pub static ref IPV4: Regex =
            Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("ipv4 pattern");
    }
}

/// What the redactor masks.
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_ip_addresses: bool,
    pub hash_for_correlation: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_ip_addresses: true,
            hash_for_correlation: true,
        }
    }
}

/// Masks personal data in certificate subjects and issuers.
///
/// Client certificate DNs routinely carry an `emailAddress` attribute or an
/// address in the CN.
#[derive(Debug, Clone, Default)]
pub struct SubjectRedactor {
    config: RedactionConfig,
}

impl SubjectRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// Redactor that returns its input unchanged.
    pub fn disabled() -> Self {
        Self::new(RedactionConfig {
            redact_emails: false,
            redact_ip_addresses: false,
            hash_for_correlation: false,
        })
    }

    pub fn from_logger_config(config: &LoggerConfig) -> Self {
        if !config.redact_subjects {
            return Self::disabled();
        }
        Self::new(RedactionConfig {
            hash_for_correlation: config.hash_for_correlation,
            ..RedactionConfig::default()
        })
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_emails {
            result = self.replace(&patterns::EMAIL, &result, "EMAIL", mask_email);
        }

        if self.config.redact_ip_addresses {
            result = self.replace(&patterns::IPV4, &result, "IP", mask_ip);
        }

        result
    }

    fn replace(
        &self,
        pattern: &Regex,
        text: &str,
        label: &str,
        mask: fn(&str) -> String,
    ) -> String {
        pattern
            .replace_all(text, |caps: &Captures<'_>| {
                let value = caps.get(0).map_or("", |m| m.as_str());
                if self.config.hash_for_correlation {
                    format!("{label}[{}]", hash_value(value))
                } else {
                    mask(value)
                }
            })
            .into_owned()
    }
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = |s: &str| s.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}***", first(local), first(domain))
        }
        None => "***@***".to_string(),
    }
}

fn mask_ip(ip: &str) -> String {
    let octets: Vec<&str> = ip.split('.').collect();
    match (octets.first(), octets.last()) {
        (Some(first), Some(last)) if octets.len() == 4 => format!("{first}.***.***.{last}"),
        _ => "***.***.***.***".to_string(),
    }
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let prefix: Vec<u8> = digest.iter().take(6).copied().collect();
    general_purpose::URL_SAFE_NO_PAD.encode(prefix)
}
