//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConverterError;

/// Audio format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Opus (modern, efficient)
    Opus,
    /// Ogg Vorbis
    OggVorbis,
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// WAVE (uncompressed)
    Wav,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::Opus => "opus",
            Self::OggVorbis => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Opus => "libopus",
            Self::OggVorbis => "libvorbis",
            Self::Flac => "flac",
            Self::Wav => "pcm_s16le",
        }
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }
}

/// Constraints for the audio derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConstraints {
    /// Target audio format.
    pub format: AudioFormat,
    /// Target bitrate in kbps (lossy formats only; encoder default when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Target sample rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    /// Number of audio channels (1 = mono, 2 = stereo).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            format: AudioFormat::Mp3,
            bitrate_kbps: None,
            sample_rate_hz: None, // Keep original
            channels: None,       // Keep original
        }
    }
}

/// Name of the audio derivative of `input`: its stem with the target extension.
pub fn output_file_name(input: &Path, format: AudioFormat) -> Option<String> {
    let stem = input.file_stem()?.to_string_lossy();
    Some(format!("{}.{}", stem, format.extension()))
}

/// A conversion job request.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Identifier used in logs and results.
    pub job_id: String,
    /// Input file path.
    pub input_path: PathBuf,
    /// Output file path.
    pub output_path: PathBuf,
    /// Conversion constraints.
    pub constraints: AudioConstraints,
}

impl ConversionJob {
    /// Builds a job writing the derivative of `input_path` into `output_dir`.
    pub fn new(
        job_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_dir: &Path,
        constraints: AudioConstraints,
    ) -> Result<Self, ConverterError> {
        let input_path = input_path.into();
        let file_name = output_file_name(&input_path, constraints.format).ok_or_else(|| {
            ConverterError::UnsupportedInputFormat {
                format: format!("no file name in {:?}", input_path),
            }
        })?;

        Ok(Self {
            job_id: job_id.into(),
            output_path: output_dir.join(file_name),
            input_path,
            constraints,
        })
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Job ID.
    pub job_id: String,
    /// Output file path.
    pub output_path: PathBuf,
    /// Output file size in bytes.
    pub output_size_bytes: u64,
    /// Conversion duration in milliseconds.
    pub duration_ms: u64,
    /// Detected input format.
    pub input_format: String,
    /// Output format used.
    pub output_format: String,
}

/// Information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Container format (e.g., "mov", "matroska").
    pub format: String,
    /// Audio codec (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// Audio sample rate (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    /// Audio channels (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u8>,
    /// Video codec (if present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
}

impl MediaInfo {
    /// Whether the file carries an audio stream to extract.
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}
