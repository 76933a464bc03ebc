//! Per-run cancellation token.
//!
//! A run owns exactly one [`CancellationToken`]. Clones share the same state,
//! so the caller keeps one handle to request cancellation while every unit
//! of the run observes another.
//!
//! Units observe the token in one of two ways:
//! - **poll**: [`CancellationToken::is_requested`], checked between items and
//!   at chunk boundaries while streaming a transfer.
//! - **push**: [`CancellationToken::requested`] (awaitable) or
//!   [`CancellationToken::on_requested`] (callback), used where the control
//!   flow is parked on something else, such as an external process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

/// Cancellation signal scoped to one pipeline run.
///
/// Transitions `Active -> Requested` at most once and never back.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the `Active` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Returns `true` if this call performed the transition, `false` if
    /// cancellation had already been requested.
    pub fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        if first {
            debug!("Cancellation requested");
            self.inner.cancel();
        }
        first
    }

    /// Whether cancellation has been requested.
    pub fn is_requested(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Completes once cancellation has been requested.
    ///
    /// Completes immediately if the token is already `Requested`.
    pub async fn requested(&self) {
        self.inner.cancelled().await
    }

    /// Registers a callback invoked once when cancellation is requested.
    ///
    /// The callback runs on the tokio runtime. If the token is already
    /// `Requested` it runs right away. Dropping the returned
    /// [`Subscription`] detaches the callback before it fires.
    pub fn on_requested<F>(&self, callback: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.inner.clone();
        let task = tokio::spawn(async move {
            token.cancelled().await;
            callback();
        });
        Subscription { task }
    }
}

/// Guard for a callback registered with [`CancellationToken::on_requested`].
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Whether the callback has already run (or been detached).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
