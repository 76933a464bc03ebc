//! Two-phase run: transfer every item, then transcode the ones that arrived.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::converter::{ConversionJob, Converter};
use crate::metrics;
use crate::progress::{Phase, ProgressReporter, ProgressSink, StageLabel};
use crate::transfer::{Downloader, ResourceRef, TransferRequest};

use super::config::PipelineConfig;
use super::types::{
    PipelineError, PipelineState, RunSummary, TranscodeOutcome, TransferOutcome, UnitFailure,
};

/// Sequences Transfer Units and Transcode Units for one batch at a time.
///
/// A `Pipeline` can be reused across runs; each run gets its own
/// cancellation token from the caller.
pub struct Pipeline<D: Downloader, C: Converter> {
    config: PipelineConfig,
    downloader: D,
    converter: C,
    state: RwLock<PipelineState>,
}

impl<D: Downloader, C: Converter> Pipeline<D, C> {
    /// Creates a new pipeline.
    pub fn new(config: PipelineConfig, downloader: D, converter: C) -> Self {
        Self {
            config,
            downloader,
            converter,
            state: RwLock::new(PipelineState::Idle),
        }
    }

    /// Current state of the latest run.
    pub async fn state(&self) -> PipelineState {
        *self.state.read().await
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Runs the pipeline over plain locators, numbered by position.
    pub async fn run_urls<I, S>(
        &self,
        urls: I,
        base_dir: &Path,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let batch = ResourceRef::batch(urls);
        self.run(&batch, base_dir, sink, token).await
    }

    /// Runs the pipeline to a terminal state.
    ///
    /// Returns `Ok` for both completed and cancelled runs; the summary's
    /// `final_state` tells them apart. Only a working directory that cannot
    /// be created is an error.
    pub async fn run(
        &self,
        batch: &[ResourceRef],
        base_dir: &Path,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        info!(
            "Starting run of {} item(s) into {:?}",
            batch.len(),
            base_dir
        );

        // Download phase
        self.set_state(PipelineState::DownloadPhase).await;
        let downloads_dir = base_dir.join(&self.config.downloads_dir);
        create_working_dir(&downloads_dir).await?;

        let transfers = self
            .download_phase(batch, &downloads_dir, sink, token)
            .await;

        if token.is_requested() {
            info!(
                "Cancelled during download phase after {} of {} transfer(s)",
                transfers.len(),
                batch.len()
            );
            return Ok(self
                .finish(batch.len(), PipelineState::Cancelled, transfers, Vec::new())
                .await);
        }

        // Filter phase
        self.set_state(PipelineState::FilterPhase).await;
        let sources: Vec<PathBuf> = transfers
            .iter()
            .filter(|t| t.succeeded)
            .filter_map(|t| t.local_path.clone())
            .collect();

        if sources.is_empty() {
            info!("No transfer succeeded, skipping convert phase");
            return Ok(self
                .finish(batch.len(), PipelineState::Done, transfers, Vec::new())
                .await);
        }

        // Convert phase
        self.set_state(PipelineState::ConvertPhase).await;
        let converted_dir = base_dir.join(&self.config.converted_dir);
        create_working_dir(&converted_dir).await?;

        let total = sources.len();
        let mut transcodes = Vec::with_capacity(total);

        for (position, source) in sources.into_iter().enumerate() {
            if token.is_requested() {
                info!(
                    "Cancellation requested, not starting remaining {} transcode(s)",
                    total - position
                );
                break;
            }

            let outcome = self
                .transcode_one(source, position, total, &converted_dir, sink, token)
                .await;
            transcodes.push(outcome);
        }

        // A process killed from outside fails its item but does not end the run.
        let final_state = if token.is_requested() {
            PipelineState::Cancelled
        } else {
            PipelineState::Done
        };

        Ok(self
            .finish(batch.len(), final_state, transfers, transcodes)
            .await)
    }

    /// Runs the Transfer Units, at most `max_concurrent_downloads` at a time.
    ///
    /// Outcomes keep batch order. Items whose turn comes after cancellation
    /// are never started and produce no outcome.
    async fn download_phase(
        &self,
        batch: &[ResourceRef],
        dest_dir: &Path,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Vec<TransferOutcome> {
        let total = batch.len();
        let limit = self.config.max_concurrent_downloads.max(1);

        stream::iter(batch.iter().enumerate())
            .map(|(position, resource)| {
                self.transfer_one(resource, position, total, dest_dir, sink, token)
            })
            .buffered(limit)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await
    }

    async fn transfer_one(
        &self,
        resource: &ResourceRef,
        position: usize,
        total: usize,
        dest_dir: &Path,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Option<TransferOutcome> {
        if token.is_requested() {
            debug!("Skipping transfer of item {}: cancelled", position + 1);
            return None;
        }

        let progress = ProgressReporter::new(StageLabel::new(Phase::Download, position, total), sink);
        progress.start();

        let request = TransferRequest {
            resource: resource.clone(),
            dest_dir: dest_dir.to_path_buf(),
        };

        let start = Instant::now();
        let outcome = match self.downloader.download(&request, token, &progress).await {
            Ok(receipt) => {
                info!(
                    "Transferred {} ({} bytes) to {:?}",
                    resource.url, receipt.bytes, receipt.path
                );
                TransferOutcome::success(&resource.url, resource.ordinal, receipt.path)
            }
            Err(e) if e.is_cancellation() => {
                info!("Transfer of {} cancelled", resource.url);
                TransferOutcome::failure(&resource.url, resource.ordinal, UnitFailure::from(&e))
            }
            Err(e) => {
                warn!("Transfer of {} failed: {}", resource.url, e);
                TransferOutcome::failure(&resource.url, resource.ordinal, UnitFailure::from(&e))
            }
        };

        let result = outcome.metric_label();
        metrics::TRANSFERS_TOTAL.with_label_values(&[result]).inc();
        metrics::TRANSFER_DURATION
            .with_label_values(&[result])
            .observe(start.elapsed().as_secs_f64());

        Some(outcome)
    }

    async fn transcode_one(
        &self,
        source: PathBuf,
        position: usize,
        total: usize,
        dest_dir: &Path,
        sink: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> TranscodeOutcome {
        let label = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.display().to_string());

        let progress = ProgressReporter::new(StageLabel::new(Phase::Convert, position, total), sink);
        progress.start();

        let start = Instant::now();
        let result = match ConversionJob::new(
            format!("convert-{}", position + 1),
            &source,
            dest_dir,
            self.converter.default_constraints(),
        ) {
            Ok(job) => self.converter.convert(job, token, &progress).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(converted) => {
                info!(
                    "Converted {} to {:?} in {} ms",
                    label, converted.output_path, converted.duration_ms
                );
                TranscodeOutcome::success(&label, source, converted.output_path)
            }
            Err(e) if e.is_cancellation() => {
                info!("Transcode of {} stopped: {}", label, e);
                TranscodeOutcome::failure(&label, source, UnitFailure::from(&e))
            }
            Err(e) => {
                error!("Transcode of {} failed: {}", label, e);
                TranscodeOutcome::failure(&label, source, UnitFailure::from(&e))
            }
        };

        let result = outcome.metric_label();
        metrics::TRANSCODES_TOTAL.with_label_values(&[result]).inc();
        metrics::TRANSCODE_DURATION
            .with_label_values(&[result])
            .observe(start.elapsed().as_secs_f64());

        outcome
    }

    async fn finish(
        &self,
        batch_size: usize,
        final_state: PipelineState,
        transfers: Vec<TransferOutcome>,
        transcodes: Vec<TranscodeOutcome>,
    ) -> RunSummary {
        self.set_state(final_state).await;
        metrics::RUNS_TOTAL
            .with_label_values(&[final_state.as_str()])
            .inc();

        let summary = RunSummary::new(batch_size, final_state, transfers, transcodes);
        info!(
            "Run finished ({}): attempted={} transferred={} converted={}",
            final_state, summary.attempted, summary.transferred, summary.converted
        );
        summary
    }

    async fn set_state(&self, next: PipelineState) {
        let mut state = self.state.write().await;
        if *state != next {
            info!("Pipeline state {} -> {}", *state, next);
        }
        *state = next;
    }
}

/// Creates a working directory; an existing one is fine.
async fn create_working_dir(path: &Path) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| PipelineError::WorkingDirectory {
            path: path.to_path_buf(),
            source,
        })
}
