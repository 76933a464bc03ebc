//! Configuration for the pipeline module.

use serde::{Deserialize, Serialize};

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory under the base path receiving raw transfers.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,

    /// Directory under the base path receiving audio derivatives.
    #[serde(default = "default_converted_dir")]
    pub converted_dir: String,

    /// Maximum transfers in flight. 1 keeps the phase strictly sequential.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

fn default_downloads_dir() -> String {
    "downloads".to_string()
}

fn default_converted_dir() -> String {
    "converted".to_string()
}

fn default_max_concurrent_downloads() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            converted_dir: default_converted_dir(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

impl PipelineConfig {
    /// Sets the transfer concurrency limit.
    pub fn with_max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = limit;
        self
    }
}
