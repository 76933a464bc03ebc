//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cancel::CancellationToken;
use crate::converter::{
    AudioConstraints, ConversionJob, ConversionResult, Converter, ConverterError, MediaInfo,
};
use crate::progress::ProgressReporter;

/// Scripted failure for one input file.
#[derive(Debug, Clone)]
pub enum MockConvertFailure {
    /// ffmpeg reports a processing error.
    Fault(String),
    /// The process is stopped by a SIGKILL or SIGTERM we did not send.
    Terminated(i32),
}

/// A recorded conversion job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// The job that was submitted.
    pub job: ConversionJob,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track conversion jobs for assertions
/// - Simulate success/failure per input file name
/// - Simulate progress updates
/// - Honour cancellation while "converting"
///
/// # Example
///
/// ```rust,ignore
/// use harvester_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.fail_file("video_2.mp4", "Invalid data found").await;
///
/// let result = converter.convert(job, &token, &progress).await?;
///
/// let conversions = converter.recorded_conversions().await;
/// assert_eq!(conversions.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockConverter {
    /// Recorded conversions.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// Scripted failures keyed by input file name.
    failures: Arc<RwLock<HashMap<String, MockConvertFailure>>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<RwLock<u64>>,
    /// Token to request when the given (1-based) conversion starts.
    cancel_on_call: Arc<RwLock<Option<(usize, CancellationToken)>>>,
    constraints: AudioConstraints,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            conversion_duration_ms: Arc::new(RwLock::new(0)),
            cancel_on_call: Arc::new(RwLock::new(None)),
            constraints: AudioConstraints::default(),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Get the number of conversions started.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Make conversions of `file_name` fail with a processing error.
    pub async fn fail_file(&self, file_name: impl Into<String>, reason: impl Into<String>) {
        self.failures
            .write()
            .await
            .insert(file_name.into(), MockConvertFailure::Fault(reason.into()));
    }

    /// Make conversions of `file_name` die from `signal`.
    pub async fn terminate_file(&self, file_name: impl Into<String>, signal: i32) {
        self.failures
            .write()
            .await
            .insert(file_name.into(), MockConvertFailure::Terminated(signal));
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Request `token` as soon as the `call`-th conversion (1-based) starts.
    pub async fn cancel_on_call(&self, call: usize, token: CancellationToken) {
        *self.cancel_on_call.write().await = Some((call, token));
    }

    /// Create a default MediaInfo for testing.
    fn create_default_info(path: &Path) -> MediaInfo {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown");

        let is_video = matches!(extension, "mkv" | "mp4" | "avi" | "mov" | "webm");

        MediaInfo {
            path: path.to_path_buf(),
            size_bytes: 100 * 1024 * 1024, // 100 MB
            duration_secs: if is_video { 3600.0 } else { 180.0 },
            format: extension.to_string(),
            audio_codec: Some("aac".to_string()),
            audio_sample_rate: Some(48000),
            audio_channels: Some(2),
            video_codec: is_video.then(|| "h264".to_string()),
        }
    }

    async fn run_job(
        &self,
        job: &ConversionJob,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<ConversionResult, ConverterError> {
        let file_name = job
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let failure = self.failures.read().await.get(&file_name).cloned();

        let duration_ms = *self.conversion_duration_ms.read().await;
        let steps: u64 = 5;
        let step_duration = Duration::from_millis(duration_ms / steps);

        for i in 0..steps {
            if token.is_requested() {
                return Err(ConverterError::Cancelled);
            }
            if !step_duration.is_zero() {
                tokio::select! {
                    biased;
                    _ = token.requested() => return Err(ConverterError::Cancelled),
                    _ = tokio::time::sleep(step_duration) => {}
                }
            }
            // Failures strike halfway through.
            if i == steps / 2 {
                match &failure {
                    Some(MockConvertFailure::Fault(reason)) => {
                        return Err(ConverterError::conversion_failed(
                            "FFmpeg exited with code: Some(1)",
                            Some(reason.clone()),
                        ));
                    }
                    Some(MockConvertFailure::Terminated(signal)) => {
                        return Err(ConverterError::Terminated { signal: *signal });
                    }
                    None => {}
                }
            }
            progress.update((i + 1) as f32 / steps as f32 * 100.0);
        }

        let body = b"mock audio";
        tokio::fs::write(&job.output_path, body).await?;

        Ok(ConversionResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: body.len() as u64,
            duration_ms,
            input_format: job
                .input_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
            output_format: job.constraints.format.extension().to_string(),
        })
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_constraints(&self) -> AudioConstraints {
        self.constraints.clone()
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError> {
        Ok(Self::create_default_info(path))
    }

    async fn convert(
        &self,
        job: ConversionJob,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<ConversionResult, ConverterError> {
        let call = self.conversion_count().await + 1;
        if let Some((target, cancel)) = self.cancel_on_call.read().await.as_ref() {
            if *target == call {
                cancel.request();
            }
        }

        let result = self.run_job(&job, token, progress).await;
        self.conversions.write().await.push(RecordedConversion {
            job,
            success: result.is_ok(),
        });
        result
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}
