//! Converter module for extracting audio from downloaded media.
//!
//! This module provides the `Converter` trait and an FFmpeg-backed
//! implementation that drops the video stream and re-encodes the audio.
//!
//! # Features
//!
//! - Audio derivatives (MP3, AAC, Opus, Vorbis, FLAC, WAV)
//! - Progress forwarding from ffmpeg's `-progress` output
//! - Immediate process kill when cancellation is requested
//! - Encoder detection against the installed ffmpeg
//!
//! # Example
//!
//! ```ignore
//! use harvester_core::converter::{AudioConstraints, ConversionJob, Converter, FfmpegConverter};
//! use harvester_core::{CancellationToken, Phase, ProgressReporter, StageLabel};
//!
//! let converter = FfmpegConverter::with_defaults();
//! converter.validate().await?;
//!
//! let job = ConversionJob::new(
//!     "job-1",
//!     "/data/downloads/video_1.mp4",
//!     Path::new("/data/converted"),
//!     AudioConstraints::default(),
//! )?;
//!
//! let progress = ProgressReporter::detached(StageLabel::new(Phase::Convert, 0, 1));
//! let result = converter.convert(job, &CancellationToken::new(), &progress).await?;
//! println!("Converted in {} ms", result.duration_ms);
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use capabilities::EncoderCapabilities;
pub use config::ConverterConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub use traits::Converter;
pub use types::{
    output_file_name, AudioConstraints, AudioFormat, ConversionJob, ConversionResult, MediaInfo,
};
