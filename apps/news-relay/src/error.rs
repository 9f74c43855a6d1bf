use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Candidate- and run-level failures. None of these terminate the process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("news source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("item {id} unavailable: {reason}")]
    ItemUnavailable { id: String, reason: String },

    #[error("article at {url} not extractable: {reason}")]
    NotExtractable { url: String, reason: String },

    #[error("translation degraded to original text: {0}")]
    TranslationDegraded(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("timed out after {after:?} while {stage}")]
    Timeout { stage: &'static str, after: Duration },
}

impl RelayError {
    pub fn not_extractable(url: &str, reason: impl Into<String>) -> Self {
        RelayError::NotExtractable {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Startup-fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Seen-store persistence failures. Corruption is startup-fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seen store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("seen store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}
