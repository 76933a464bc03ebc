//! HTTP downloader implementation.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::metrics;
use crate::progress::ProgressReporter;

use super::config::TransferConfig;
use super::error::TransferError;
use super::traits::Downloader;
use super::types::{transfer_file_name, TransferReceipt, TransferRequest};

/// Streams resources over HTTP(S) straight to disk.
pub struct HttpDownloader {
    client: Client,
    config: TransferConfig,
}

impl HttpDownloader {
    /// Creates a downloader with the given configuration.
    pub fn new(config: TransferConfig) -> Result<Self, TransferError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransferError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Creates a downloader with default configuration.
    pub fn with_defaults() -> Result<Self, TransferError> {
        Self::new(TransferConfig::default())
    }

    /// Writes the response body to `file` chunk by chunk.
    ///
    /// Returns the number of bytes written.
    async fn stream_body(
        response: Response,
        mut file: File,
        path: &Path,
        total_bytes: Option<u64>,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<u64, TransferError> {
        let mut stream = response.bytes_stream();
        let mut received = 0u64;

        loop {
            // Checked before every read; also wakes a read that is stuck
            // waiting on a stalled connection.
            let next = tokio::select! {
                biased;
                _ = token.requested() => return Err(TransferError::Cancelled),
                next = stream.next() => next,
            };

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(path, e))?;

            received += chunk.len() as u64;
            metrics::BYTES_TRANSFERRED.inc_by(chunk.len() as u64);

            if let Some(total) = total_bytes {
                progress.update((received as f64 / total as f64 * 100.0) as f32);
            }
        }

        file.flush().await.map_err(|e| TransferError::io(path, e))?;
        Ok(received)
    }

    async fn discard_partial(&self, path: &Path) {
        if self.config.keep_partial_files {
            return;
        }
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed partial file {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial file {:?}: {}", path, e),
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &str {
        "http"
    }

    fn destination(&self, request: &TransferRequest) -> PathBuf {
        request
            .dest_dir
            .join(transfer_file_name(&self.config, request.resource.ordinal))
    }

    async fn download(
        &self,
        request: &TransferRequest,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<TransferReceipt, TransferError> {
        let start = Instant::now();
        let url = &request.resource.url;
        let path = self.destination(request);

        let response = tokio::select! {
            biased;
            _ = token.requested() => return Err(TransferError::Cancelled),
            response = self.client.get(url).send() => response.map_err(|e| {
                match TransferError::from(e) {
                    TransferError::InvalidUrl { .. } => TransferError::InvalidUrl { url: url.clone() },
                    other => other,
                }
            })?,
        };

        // Nothing is written to disk for a rejected request.
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Remote {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length().filter(|len| *len > 0);
        debug!(
            "Streaming {} to {:?} ({} bytes expected)",
            url,
            path,
            total_bytes.map_or_else(|| "unknown".to_string(), |t| t.to_string())
        );

        let file = File::create(&path)
            .await
            .map_err(|e| TransferError::io(&path, e))?;

        match Self::stream_body(response, file, &path, total_bytes, token, progress).await {
            Ok(bytes) => Ok(TransferReceipt {
                path,
                bytes,
                total_bytes,
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                self.discard_partial(&path).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Phase, StageLabel};
    use crate::transfer::ResourceRef;

    #[test]
    fn test_destination_is_positional() {
        let downloader = HttpDownloader::with_defaults().unwrap();
        let request = TransferRequest {
            resource: ResourceRef::new("https://media.example/screen.mp4", 3),
            dest_dir: PathBuf::from("/data/downloads"),
        };
        assert_eq!(
            downloader.destination(&request),
            PathBuf::from("/data/downloads/video_4.mp4")
        );
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let downloader = HttpDownloader::with_defaults().unwrap();
        let request = TransferRequest {
            resource: ResourceRef::new("not a url", 0),
            dest_dir: dir.path().to_path_buf(),
        };
        let progress = ProgressReporter::detached(StageLabel::new(Phase::Download, 0, 1));

        let result = downloader
            .download(&request, &CancellationToken::new(), &progress)
            .await;

        assert!(matches!(result, Err(TransferError::InvalidUrl { .. })));
        assert!(!downloader.destination(&request).exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let downloader = HttpDownloader::with_defaults().unwrap();
        let request = TransferRequest {
            resource: ResourceRef::new("http://127.0.0.1:9/never", 0),
            dest_dir: dir.path().to_path_buf(),
        };
        let token = CancellationToken::new();
        token.request();
        let progress = ProgressReporter::detached(StageLabel::new(Phase::Download, 0, 1));

        let result = downloader.download(&request, &token, &progress).await;
        assert!(matches!(result, Err(TransferError::Cancelled)));
    }
}
