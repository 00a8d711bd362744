//! Error types for the drive_zip crate.

use thiserror::Error;

/// Errors that can occur while mirroring a Drive tree into an archive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Transient network error: {0}")]
    TransientNetworkError(String),

    #[error("Download failed for {id}: {message}")]
    DownloadError { id: String, message: String },

    #[error("Archive write failed: {0}")]
    ArchiveWriteError(String),

    #[error("Folder {0} appears as its own descendant")]
    CycleDetected(String),

    #[error("Archive finalized with {0} entries still pending")]
    PendingEntries(usize),

    #[error("Failed to read credentials file: {0}")]
    CredentialsFileError(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DriveError {
    /// Classify a failed API response by its HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::AuthError(message),
            404 => Self::NotFound(message),
            408 | 429 | 500..=599 => Self::TransientNetworkError(message),
            _ => Self::ApiError { status, message },
        }
    }

    /// Classify a transport-level failure. Connect and timeout failures are
    /// retryable in principle; everything else stays an `HttpError`.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::TransientNetworkError(err.to_string())
        } else {
            Self::HttpError(err)
        }
    }

    /// Wrap any failure that happened while opening or reading a content
    /// stream. Auth failures stay auth failures.
    pub fn into_download(self, id: &str) -> Self {
        match self {
            Self::AuthError(_) | Self::DownloadError { .. } => self,
            other => Self::DownloadError {
                id: id.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
