//! Error types for the transfer module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while transferring a resource.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The resource locator could not be parsed.
    #[error("Invalid resource URL: {url}")]
    InvalidUrl { url: String },

    /// The server answered with a non-success status.
    #[error("Remote responded with status {status} for {url}")]
    Remote { url: String, status: u16 },

    /// The connection or the response body failed mid-flight.
    #[error("Network error: {0}")]
    Network(String),

    /// Writing the local file failed.
    #[error("Failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transfer was stopped because cancellation was requested.
    #[error("Transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Creates a new I/O error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a cancellation rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            let url = e.url().map(|u| u.to_string()).unwrap_or_default();
            return Self::InvalidUrl { url };
        }
        if let Some(status) = e.status() {
            return Self::Remote {
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            };
        }
        if e.is_timeout() {
            return Self::Network(format!("timed out: {}", e));
        }
        Self::Network(e.to_string())
    }
}
