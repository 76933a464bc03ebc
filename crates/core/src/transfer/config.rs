//! Configuration for the transfer module.

use serde::{Deserialize, Serialize};

/// Configuration for HTTP transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// File name prefix for transferred items (`<prefix>_<n>.<ext>`).
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Extension given to transferred items.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum time to wait for the next chunk of a response body, in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Keep partially written files after a failed or cancelled transfer.
    #[serde(default)]
    pub keep_partial_files: bool,
}

fn default_file_prefix() -> String {
    "video".to_string()
}

fn default_file_extension() -> String {
    "mp4".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    120
}

fn default_user_agent() -> String {
    concat!("harvester/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            file_extension: default_file_extension(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            user_agent: default_user_agent(),
            keep_partial_files: false,
        }
    }
}

impl TransferConfig {
    /// Sets the naming scheme for transferred files.
    pub fn with_naming(mut self, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self.file_extension = extension.into();
        self
    }

    /// Sets the read timeout in seconds.
    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Keep partial files on failure.
    pub fn with_keep_partial_files(mut self, keep: bool) -> Self {
        self.keep_partial_files = keep;
        self
    }
}
