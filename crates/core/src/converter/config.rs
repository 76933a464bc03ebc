//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{AudioConstraints, AudioFormat};

/// Configuration for the FFmpeg-based converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Audio format of the derivatives.
    #[serde(default = "default_target_format")]
    pub target_format: AudioFormat,

    /// Target bitrate in kbps for lossy formats.
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: Option<u32>,

    /// Target sample rate in Hz (source rate when unset).
    #[serde(default)]
    pub sample_rate_hz: Option<u32>,

    /// Channel count (source layout when unset).
    #[serde(default)]
    pub channels: Option<u8>,

    /// Timeout for a single conversion job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Minimum interval between progress updates in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_target_format() -> AudioFormat {
    AudioFormat::Mp3
}

fn default_bitrate() -> Option<u32> {
    Some(192)
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_progress_interval() -> u64 {
    500
}

fn default_log_level() -> String {
    "warning".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            target_format: default_target_format(),
            bitrate_kbps: default_bitrate(),
            sample_rate_hz: None,
            channels: None,
            timeout_secs: default_timeout(),
            progress_interval_ms: default_progress_interval(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the target format.
    pub fn with_target_format(mut self, format: AudioFormat) -> Self {
        self.target_format = format;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the minimum interval between progress updates.
    pub fn with_progress_interval(mut self, interval_ms: u64) -> Self {
        self.progress_interval_ms = interval_ms;
        self
    }

    /// Constraints applied to every conversion.
    pub fn constraints(&self) -> AudioConstraints {
        AudioConstraints {
            format: self.target_format,
            bitrate_kbps: self.bitrate_kbps,
            sample_rate_hz: self.sample_rate_hz,
            channels: self.channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.target_format, AudioFormat::Mp3);
        assert_eq!(config.bitrate_kbps, Some(192));
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.progress_interval_ms, 500);
    }

    #[test]
    fn test_config_builder() {
        let config = ConverterConfig::with_paths(
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffprobe"),
        )
        .with_target_format(AudioFormat::Opus)
        .with_timeout(7200)
        .with_progress_interval(0);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.target_format, AudioFormat::Opus);
        assert_eq!(config.timeout_secs, 7200);
        assert_eq!(config.progress_interval_ms, 0);
    }

    #[test]
    fn test_constraints_follow_config() {
        let config = ConverterConfig {
            bitrate_kbps: Some(128),
            channels: Some(1),
            ..Default::default()
        };
        let constraints = config.constraints();
        assert_eq!(constraints.format, AudioFormat::Mp3);
        assert_eq!(constraints.bitrate_kbps, Some(128));
        assert_eq!(constraints.channels, Some(1));
        assert_eq!(constraints.sample_rate_hz, None);
    }

    #[test]
    fn test_deserialize_toml() {
        let toml = r#"
            target_format = "aac"
            bitrate_kbps = 96
        "#;
        let config: ConverterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.target_format, AudioFormat::Aac);
        assert_eq!(config.bitrate_kbps, Some(96));
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_bitrate_defaults_to_192() {
        let config: ConverterConfig = toml::from_str("target_format = \"mp3\"").unwrap();
        assert_eq!(config.bitrate_kbps, Some(192));
    }
}
