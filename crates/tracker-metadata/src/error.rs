use reqwest::StatusCode;
use thiserror::Error;
use vod_recovery::RecoveryError;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("unsupported tracker url: {0}")]
    UnsupportedUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("{site}: {reason}")]
    Parse { site: &'static str, reason: String },

    #[error("no successful response from {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: usize },

    #[error("invalid export: {0}")]
    InvalidExport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    pub fn parse(site: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            site,
            reason: reason.into(),
        }
    }
}

impl From<TrackerError> for RecoveryError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::UnsupportedUrl(url) => {
                RecoveryError::invalid_input(format!("unsupported tracker url `{url}`"))
            }
            TrackerError::Io(source) => RecoveryError::Io { source },
            other => RecoveryError::metadata(other.to_string()),
        }
    }
}
