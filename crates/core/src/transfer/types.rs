//! Types for the transfer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::config::TransferConfig;

/// A remote media item and its position in the requested batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Locator of the remote resource.
    pub url: String,
    /// Zero-based position in the batch.
    pub ordinal: usize,
}

impl ResourceRef {
    pub fn new(url: impl Into<String>, ordinal: usize) -> Self {
        Self {
            url: url.into(),
            ordinal,
        }
    }

    /// Builds refs for a list of locators, numbered by position.
    pub fn batch<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(ordinal, url)| Self::new(url, ordinal))
            .collect()
    }
}

/// A request to transfer one resource into a directory.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub resource: ResourceRef,
    /// Directory the file is written into.
    pub dest_dir: PathBuf,
}

/// What a successful transfer produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Local path of the written file.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Size announced by the server, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Wall time of the transfer in milliseconds.
    pub elapsed_ms: u64,
}

/// File name for the item at `ordinal`: `<prefix>_<ordinal + 1>.<ext>`.
///
/// Names depend only on the position, so the same batch always maps to the
/// same paths.
pub fn transfer_file_name(config: &TransferConfig, ordinal: usize) -> String {
    format!(
        "{}_{}.{}",
        config.file_prefix,
        ordinal + 1,
        config.file_extension
    )
}
