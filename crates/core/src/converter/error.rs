//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Input file is not a supported format.
    #[error("Unsupported input format: {format}")]
    UnsupportedInputFormat { format: String },

    /// The installed ffmpeg cannot encode the target format.
    #[error("Encoder not available: {codec}")]
    EncoderUnavailable { codec: String },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// Conversion process failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// We killed the process because cancellation was requested.
    #[error("Conversion cancelled")]
    Cancelled,

    /// The process was stopped by a SIGINT, SIGKILL or SIGTERM we did not send.
    #[error("Conversion terminated by signal {signal}")]
    Terminated { signal: i32 },
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Whether the process was stopped deliberately rather than failing.
    ///
    /// Deliberate terminations are reported like cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Terminated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cancellation() {
        assert!(ConverterError::Cancelled.is_cancellation());
        assert!(ConverterError::Terminated { signal: 9 }.is_cancellation());
        assert!(!ConverterError::conversion_failed("bad stream", None).is_cancellation());
        assert!(!ConverterError::Timeout { timeout_secs: 5 }.is_cancellation());
    }

    #[test]
    fn test_error_display() {
        let err = ConverterError::conversion_failed("FFmpeg exited with code: Some(1)", None);
        assert_eq!(
            err.to_string(),
            "Conversion failed: FFmpeg exited with code: Some(1)"
        );
        let err = ConverterError::Terminated { signal: 15 };
        assert_eq!(err.to_string(), "Conversion terminated by signal 15");
    }
}
