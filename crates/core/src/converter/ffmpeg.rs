//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::progress::ProgressReporter;

use super::capabilities::EncoderCapabilities;
use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::{AudioConstraints, ConversionJob, ConversionResult, MediaInfo};

/// Lines of ffmpeg error output kept for the failure report.
const MAX_ERROR_LINES: usize = 20;

/// FFmpeg-based converter implementation.
pub struct FfmpegConverter {
    config: ConverterConfig,
}

impl FfmpegConverter {
    /// Creates a new FFmpeg converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Builds ffmpeg arguments for an audio-only derivative.
    fn build_audio_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        constraints: &AudioConstraints,
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-vn".to_string(), // Drop video
        ];

        // Audio codec
        args.extend([
            "-c:a".to_string(),
            constraints.format.ffmpeg_codec().to_string(),
        ]);

        // Bitrate (for lossy formats)
        if !constraints.format.is_lossless() {
            if let Some(bitrate) = constraints.bitrate_kbps {
                args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
            }
        }

        // Sample rate
        if let Some(rate) = constraints.sample_rate_hz {
            args.extend(["-ar".to_string(), rate.to_string()]);
        }

        // Channels
        if let Some(channels) = constraints.channels {
            args.extend(["-ac".to_string(), channels.to_string()]);
        }

        // Log level
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);

        // Progress output for parsing
        args.extend([
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        args.push(output_path.to_string_lossy().to_string());

        args
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, ConverterError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| ConverterError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");
        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
        })
    }

    /// Extracts the output position in seconds from a `-progress` line.
    fn parse_progress_time(re: &Regex, line: &str) -> Option<f64> {
        let caps = re.captures(line)?;
        // Both keys carry microseconds.
        let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;
        Some(micros / 1_000_000.0)
    }

    /// Sends SIGKILL and reaps the process.
    async fn terminate(child: &mut Child) {
        if let Err(e) = child.start_kill() {
            debug!("ffmpeg already exited before kill: {}", e);
        }
        if let Err(e) = child.wait().await {
            warn!("Failed to reap killed ffmpeg process: {}", e);
        }
    }

    /// Removes a partially written output.
    async fn discard_output(path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed incomplete output {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove incomplete output {:?}: {}", path, e),
        }
    }

    /// Runs the conversion, forwarding progress until a terminal state.
    async fn run_conversion(
        &self,
        job: &ConversionJob,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<ConversionResult, ConverterError> {
        if token.is_requested() {
            return Err(ConverterError::Cancelled);
        }

        let start = Instant::now();

        if !job.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        // Ensure output directory exists
        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                ConverterError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        // Get input duration for progress calculation
        let input_info = match self.probe(&job.input_path).await {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Probe failed for {:?}, no percent available: {}", job.input_path, e);
                None
            }
        };
        let duration_secs = input_info
            .as_ref()
            .map(|i| i.duration_secs)
            .filter(|d| *d > 0.0);

        let args = self.build_audio_args(&job.input_path, &job.output_path, &job.constraints);
        debug!("Running {:?} {}", self.config.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::conversion_failed("ffmpeg stderr not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let time_regex = Regex::new(r"^out_time_(?:ms|us)=(\d+)").ok();
        let progress_interval = Duration::from_millis(self.config.progress_interval_ms);
        let deadline = tokio::time::sleep(Duration::from_secs(self.config.timeout_secs));
        tokio::pin!(deadline);

        let mut stderr_open = true;
        let mut error_lines: Vec<String> = Vec::new();
        let mut current_time = 0.0;
        let mut last_progress_send: Option<Instant> = None;

        let status = loop {
            tokio::select! {
                biased;
                _ = token.requested() => {
                    debug!("Cancellation requested, killing ffmpeg for job {}", job.job_id);
                    Self::terminate(&mut child).await;
                    Self::discard_output(&job.output_path).await;
                    return Err(ConverterError::Cancelled);
                }
                _ = &mut deadline => {
                    warn!(
                        "Conversion {} exceeded {}s, killing ffmpeg",
                        job.job_id, self.config.timeout_secs
                    );
                    Self::terminate(&mut child).await;
                    Self::discard_output(&job.output_path).await;
                    return Err(ConverterError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    });
                }
                line = reader.next_line(), if stderr_open => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            stderr_open = false;
                            continue;
                        }
                        Err(e) => {
                            debug!("Stopped reading ffmpeg output: {}", e);
                            stderr_open = false;
                            continue;
                        }
                    };

                    // Capture error output
                    if line.contains("Error") || line.contains("error") {
                        if error_lines.len() == MAX_ERROR_LINES {
                            error_lines.remove(0);
                        }
                        error_lines.push(line.clone());
                    }

                    if let Some(secs) = time_regex
                        .as_ref()
                        .and_then(|re| Self::parse_progress_time(re, &line))
                    {
                        current_time = secs;
                    }

                    // Each -progress block ends with a progress= line
                    if let (Some(duration), Some(state)) =
                        (duration_secs, line.trim().strip_prefix("progress="))
                    {
                        if state == "end" {
                            progress.update(100.0);
                        } else if last_progress_send
                            .map_or(true, |sent| sent.elapsed() >= progress_interval)
                        {
                            progress.update((current_time / duration * 100.0).min(100.0) as f32);
                            last_progress_send = Some(Instant::now());
                        }
                    }
                }
                status = child.wait(), if !stderr_open => break status?,
            }
        };

        if !status.success() {
            Self::discard_output(&job.output_path).await;

            let stderr = if error_lines.is_empty() {
                None
            } else {
                Some(error_lines.join("\n"))
            };

            return Err(match termination_signal(&status) {
                Some(signal) if DELIBERATE_SIGNALS.contains(&signal) => {
                    ConverterError::Terminated { signal }
                }
                // A crash (SIGSEGV, SIGABRT, ...) is a fault
                Some(signal) => ConverterError::conversion_failed(
                    format!("FFmpeg killed by signal {}", signal),
                    stderr,
                ),
                None => ConverterError::conversion_failed(
                    format!("FFmpeg exited with code: {:?}", status.code()),
                    stderr,
                ),
            });
        }

        // Verify output exists and get size
        let output_meta = tokio::fs::metadata(&job.output_path)
            .await
            .map_err(|_| ConverterError::conversion_failed("Output file not created", None))?;

        let input_format = input_info
            .map(|i| i.format)
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ConversionResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            input_format,
            output_format: job.constraints.format.extension().to_string(),
        })
    }
}

/// SIGINT, SIGKILL and SIGTERM: signals someone sends on purpose to stop a process.
const DELIBERATE_SIGNALS: [i32; 3] = [2, 9, 15];

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn default_constraints(&self) -> AudioConstraints {
        self.config.constraints()
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ConverterError> {
        if !path.exists() {
            return Err(ConverterError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ConverterError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn convert(
        &self,
        job: ConversionJob,
        token: &CancellationToken,
        progress: &ProgressReporter<'_>,
    ) -> Result<ConversionResult, ConverterError> {
        self.run_conversion(&job, token, progress).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        // Check ffmpeg exists
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(ConverterError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(ConverterError::Io(e));
        }

        // Check ffprobe exists
        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(ConverterError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(ConverterError::Io(e));
        }

        // Check the target encoder is compiled in
        let target = self.config.target_format;
        match EncoderCapabilities::detect(&self.config).await {
            Some(caps) if !caps.supports(target) => {
                return Err(ConverterError::EncoderUnavailable {
                    codec: target.ffmpeg_codec().to_string(),
                });
            }
            Some(_) => {}
            None => warn!("Could not list ffmpeg encoders, skipping encoder check"),
        }

        Ok(())
    }
}
