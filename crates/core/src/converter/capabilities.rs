//! Audio encoder capability detection.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use super::config::ConverterConfig;
use super::types::AudioFormat;

/// Audio encoders detected in the installed ffmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// LAME MP3 encoder available
    pub libmp3lame: bool,
    /// Native AAC encoder available
    pub aac: bool,
    /// libopus available
    pub libopus: bool,
    /// libvorbis available
    pub libvorbis: bool,
    /// FLAC encoder available
    pub flac: bool,
    /// 16-bit PCM encoder available
    pub pcm_s16le: bool,
}

impl EncoderCapabilities {
    /// Detect available audio encoders by probing ffmpeg.
    ///
    /// Returns `None` when the encoder list could not be read.
    pub async fn detect(config: &ConverterConfig) -> Option<Self> {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        Some(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Parses the output of `ffmpeg -encoders`.
    pub fn parse(listing: &str) -> Self {
        // Lines look like " A....D libmp3lame  libmp3lame MP3 ..."
        let has = |name: &str| {
            listing
                .lines()
                .filter_map(|line| line.split_whitespace().nth(1))
                .any(|encoder| encoder == name)
        };

        Self {
            libmp3lame: has("libmp3lame"),
            aac: has("aac"),
            libopus: has("libopus"),
            libvorbis: has("libvorbis"),
            flac: has("flac"),
            pcm_s16le: has("pcm_s16le"),
        }
    }

    /// Whether the encoder for `format` is available.
    pub fn supports(&self, format: AudioFormat) -> bool {
        match format {
            AudioFormat::Mp3 => self.libmp3lame,
            AudioFormat::Aac => self.aac,
            AudioFormat::Opus => self.libopus,
            AudioFormat::OggVorbis => self.libvorbis,
            AudioFormat::Flac => self.flac,
            AudioFormat::Wav => self.pcm_s16le,
        }
    }
}
