//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::Path;

use crate::cancel::CancellationToken;
use crate::progress::ProgressReporter;

use super::error::ConverterError;
use super::types::{AudioConstraints, ConversionJob, ConversionResult, MediaInfo};

/// A converter that turns a local media file into an audio derivative.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Constraints used for jobs built by the pipeline.
    fn default_constraints(&self) -> AudioConstraints;

    /// Probes a media file to get its information.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError>;

    /// Converts a media file according to the job specification.
    ///
    /// Progress is forwarded through `progress` as the external process
    /// reports it. Once `token` is requested the process is killed and
    /// [`ConverterError::Cancelled`] is returned.
    async fn convert(
        &self,
        job: ConversionJob,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<ConversionResult, ConverterError>;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::AudioFormat;
    use crate::progress::{Phase, StageLabel};
    use std::path::PathBuf;

    struct StubConverter;

    #[async_trait]
    impl Converter for StubConverter {
        fn name(&self) -> &str {
            "stub"
        }

        fn default_constraints(&self) -> AudioConstraints {
            AudioConstraints::default()
        }

        async fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError> {
            Ok(MediaInfo {
                path: path.to_path_buf(),
                size_bytes: 1024,
                duration_secs: 180.0,
                format: "mov".to_string(),
                audio_codec: Some("aac".to_string()),
                audio_sample_rate: Some(44100),
                audio_channels: Some(2),
                video_codec: Some("h264".to_string()),
            })
        }

        async fn convert(
            &self,
            job: ConversionJob,
            token: &CancellationToken,
            progress: &ProgressReporter<'_>,
        ) -> Result<ConversionResult, ConverterError> {
            if token.is_requested() {
                return Err(ConverterError::Cancelled);
            }
            progress.update(100.0);
            Ok(ConversionResult {
                job_id: job.job_id,
                output_path: job.output_path,
                output_size_bytes: 512,
                duration_ms: 1000,
                input_format: "mov".to_string(),
                output_format: job.constraints.format.extension().to_string(),
            })
        }

        async fn validate(&self) -> Result<(), ConverterError> {
            Ok(())
        }
    }

    fn job() -> ConversionJob {
        ConversionJob::new(
            "test-job",
            "/test/video_1.mp4",
            Path::new("/test/converted"),
            AudioConstraints::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_stub_converter_probe() {
        let converter = StubConverter;
        let info = converter.probe(Path::new("/test/file.mp4")).await.unwrap();
        assert!(info.has_audio());
        assert_eq!(info.duration_secs, 180.0);
    }

    #[tokio::test]
    async fn test_stub_converter_convert() {
        let converter = StubConverter;
        let progress = ProgressReporter::detached(StageLabel::new(Phase::Convert, 0, 1));
        let result = converter
            .convert(job(), &CancellationToken::new(), &progress)
            .await
            .unwrap();
        assert_eq!(result.job_id, "test-job");
        assert_eq!(result.output_path, PathBuf::from("/test/converted/video_1.mp3"));
        assert_eq!(result.output_format, AudioFormat::Mp3.extension());
        assert_eq!(progress.last_percent(), Some(100.0));
    }

    #[tokio::test]
    async fn test_stub_converter_honours_token() {
        let converter = StubConverter;
        let token = CancellationToken::new();
        token.request();
        let progress = ProgressReporter::detached(StageLabel::new(Phase::Convert, 0, 1));
        let result = converter.convert(job(), &token, &progress).await;
        assert!(matches!(result, Err(ConverterError::Cancelled)));
    }
}
