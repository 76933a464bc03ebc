//! Trait definitions for the transfer module.

use async_trait::async_trait;

use crate::cancel::CancellationToken;
use crate::progress::ProgressReporter;

use super::error::TransferError;
use super::types::{TransferReceipt, TransferRequest};

/// Retrieves one remote resource into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns the name of this downloader implementation.
    fn name(&self) -> &str;

    /// Local path the request will be written to.
    fn destination(&self, request: &TransferRequest) -> std::path::PathBuf;

    /// Transfers the resource, reporting progress while the body streams in.
    ///
    /// Must return [`TransferError::Cancelled`] once `token` is requested
    /// and must not leave a file that looks complete behind.
    async fn download(
        &self,
        request: &TransferRequest,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<TransferReceipt, TransferError>;
}
