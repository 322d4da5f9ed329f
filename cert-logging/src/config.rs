// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output for development
    #[default]
    Pretty,
    /// Structured JSON lines for production
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
    /// Mask e-mail and IP addresses in certificate subjects before logging
    pub redact_subjects: bool,
    /// Replace masked values with a short hash so entries stay correlatable
    pub hash_for_correlation: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            ansi: true,
            redact_subjects: true,
            hash_for_correlation: true,
        }
    }
}

impl LoggerConfig {
    /// Raise the level to `debug` when `verbose` is set.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn directives(&self) -> String {
        format!("{},tower_http=info,hyper=info,rustls=warn", self.level)
    }
}
