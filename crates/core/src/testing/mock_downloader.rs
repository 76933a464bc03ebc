//! Mock downloader for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cancel::CancellationToken;
use crate::progress::ProgressReporter;
use crate::transfer::{
    transfer_file_name, Downloader, TransferConfig, TransferError, TransferReceipt,
    TransferRequest,
};

/// Scripted behaviour for one URL.
#[derive(Debug, Clone)]
pub enum MockTransfer {
    /// Write `body` to the destination. `announce_length` controls whether
    /// percent progress is reported.
    Body { body: Vec<u8>, announce_length: bool },
    /// Fail with a non-success status before anything is written.
    Remote { status: u16 },
    /// Fail while writing the local file.
    WriteFailure,
    /// Block until the token is requested, then report cancellation.
    Stall,
}

impl Default for MockTransfer {
    fn default() -> Self {
        Self::Body {
            body: b"mock media payload".to_vec(),
            announce_length: true,
        }
    }
}

/// A recorded transfer for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTransfer {
    /// The request that was submitted.
    pub request: TransferRequest,
    /// Whether the transfer succeeded.
    pub success: bool,
}

/// Mock implementation of the Downloader trait.
///
/// Provides controllable behavior for testing:
/// - Scripted outcome per URL
/// - Recorded requests for assertions
/// - Simulated progress in fixed steps
/// - Requesting cancellation when the Nth transfer starts
///
/// Successful transfers really write their body under the request's
/// destination directory, so the pipeline sees files on disk.
#[derive(Debug)]
pub struct MockDownloader {
    config: TransferConfig,
    /// Recorded transfers.
    transfers: Arc<RwLock<Vec<RecordedTransfer>>>,
    /// Scripted behaviour by URL.
    scripts: Arc<RwLock<HashMap<String, MockTransfer>>>,
    /// Simulated transfer duration in milliseconds.
    transfer_duration_ms: Arc<RwLock<u64>>,
    /// Number of progress steps reported for bodies with a known length.
    progress_steps: Arc<RwLock<u32>>,
    /// Token to request when the given (1-based) transfer starts.
    cancel_on_call: Arc<RwLock<Option<(usize, CancellationToken)>>>,
}

impl Default for MockDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDownloader {
    /// Create a new mock downloader.
    pub fn new() -> Self {
        Self::with_config(TransferConfig::default())
    }

    /// Create a mock that names files according to `config`.
    pub fn with_config(config: TransferConfig) -> Self {
        Self {
            config,
            transfers: Arc::new(RwLock::new(Vec::new())),
            scripts: Arc::new(RwLock::new(HashMap::new())),
            transfer_duration_ms: Arc::new(RwLock::new(0)),
            progress_steps: Arc::new(RwLock::new(4)),
            cancel_on_call: Arc::new(RwLock::new(None)),
        }
    }

    /// Get all recorded transfers.
    pub async fn recorded_transfers(&self) -> Vec<RecordedTransfer> {
        self.transfers.read().await.clone()
    }

    /// Get the number of transfers started.
    pub async fn transfer_count(&self) -> usize {
        self.transfers.read().await.len()
    }

    /// Script the behaviour for a URL.
    pub async fn script(&self, url: impl Into<String>, behaviour: MockTransfer) {
        self.scripts.write().await.insert(url.into(), behaviour);
    }

    /// Make `url` answer with the given status.
    pub async fn fail_with_status(&self, url: impl Into<String>, status: u16) {
        self.script(url, MockTransfer::Remote { status }).await;
    }

    /// Set the simulated transfer duration.
    pub async fn set_transfer_duration(&self, duration: Duration) {
        *self.transfer_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Set how many progress updates a known-length body produces.
    pub async fn set_progress_steps(&self, steps: u32) {
        *self.progress_steps.write().await = steps;
    }

    /// Request `token` as soon as the `call`-th transfer (1-based) starts.
    pub async fn cancel_on_call(&self, call: usize, token: CancellationToken) {
        *self.cancel_on_call.write().await = Some((call, token));
    }

    async fn record(&self, request: &TransferRequest, success: bool) {
        self.transfers.write().await.push(RecordedTransfer {
            request: request.clone(),
            success,
        });
    }

    async fn run_script(
        &self,
        request: &TransferRequest,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<TransferReceipt, TransferError> {
        let behaviour = self
            .scripts
            .read()
            .await
            .get(&request.resource.url)
            .cloned()
            .unwrap_or_default();
        let path = self.destination(request);

        match behaviour {
            MockTransfer::Remote { status } => Err(TransferError::Remote {
                url: request.resource.url.clone(),
                status,
            }),
            MockTransfer::WriteFailure => Err(TransferError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            )),
            MockTransfer::Stall => {
                token.requested().await;
                Err(TransferError::Cancelled)
            }
            MockTransfer::Body {
                body,
                announce_length,
            } => {
                let steps = (*self.progress_steps.read().await).max(1);
                let duration_ms = *self.transfer_duration_ms.read().await;
                let step_duration = Duration::from_millis(duration_ms / steps as u64);

                for i in 0..steps {
                    if token.is_requested() {
                        return Err(TransferError::Cancelled);
                    }
                    if !step_duration.is_zero() {
                        tokio::select! {
                            biased;
                            _ = token.requested() => return Err(TransferError::Cancelled),
                            _ = tokio::time::sleep(step_duration) => {}
                        }
                    }
                    if announce_length {
                        progress.update((i + 1) as f32 / steps as f32 * 100.0);
                    }
                }

                tokio::fs::write(&path, &body)
                    .await
                    .map_err(|e| TransferError::io(&path, e))?;

                Ok(TransferReceipt {
                    path,
                    bytes: body.len() as u64,
                    total_bytes: announce_length.then_some(body.len() as u64),
                    elapsed_ms: duration_ms,
                })
            }
        }
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn name(&self) -> &str {
        "mock"
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
        let call = self.transfer_count().await + 1;
        if let Some((target, cancel)) = self.cancel_on_call.read().await.as_ref() {
            if *target == call {
                cancel.request();
            }
        }

        let result = self.run_script(request, token, progress).await;
        self.record(request, result.is_ok()).await;
        result
    }
}
