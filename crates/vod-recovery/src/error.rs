use std::path::PathBuf;

use reqwest::StatusCode;

/// Result alias used throughout the recovery engine.
pub type Result<T> = std::result::Result<T, RecoveryError>;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("no segments of {path} are available, playlist discarded")]
    EmptyPlaylist { path: PathBuf },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("metadata lookup failed: {reason}")]
    Metadata { reason: String },

    #[error("download failed: {reason}")]
    Download { reason: String },
}

impl RecoveryError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    pub fn download(reason: impl Into<String>) -> Self {
        Self::Download {
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    /// Whether the error was caused by the caller rather than the network or disk.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::Configuration { .. }
        )
    }
}
