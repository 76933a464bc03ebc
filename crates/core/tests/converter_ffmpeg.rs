//! FFmpeg converter tests using shell scripts in place of ffmpeg/ffprobe.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use harvester_core::{
    testing::MockDownloader, AudioConstraints, AudioFormat, CancellationToken, ConversionJob,
    Converter, ConverterConfig, ConverterError, FfmpegConverter, NullSink, Phase, Pipeline,
    PipelineConfig, PipelineState, ProgressEvent, ProgressReporter, StageLabel, UnitFailure,
};

const FFPROBE: &str = r#"#!/bin/sh
cat <<'JSON'
{"format":{"format_name":"mov,mp4,m4a","duration":"10.0","size":"2048"},
 "streams":[{"codec_type":"video","codec_name":"h264"},
            {"codec_type":"audio","codec_name":"aac","sample_rate":"44100","channels":2}]}
JSON
"#;

const FFMPEG_OK: &str = r#"#!/bin/sh
for last; do :; done
echo "out_time_ms=5000000" >&2
echo "progress=continue" >&2
printf 'audio' > "$last"
echo "out_time_ms=10000000" >&2
echo "progress=end" >&2
exit 0
"#;

const FFMPEG_FAULT: &str = r#"#!/bin/sh
for last; do :; done
printf 'partial' > "$last"
echo "Error while decoding stream #0:1: Invalid data found when processing input" >&2
exit 1
"#;

const FFMPEG_HANG: &str = r#"#!/bin/sh
for last; do :; done
printf 'partial' > "$last"
exec sleep 30
"#;

const FFMPEG_SELF_TERMINATE: &str = r#"#!/bin/sh
kill -TERM $$
"#;

const FFMPEG_CRASH: &str = r#"#!/bin/sh
for last; do :; done
printf 'partial' > "$last"
echo "Error: segmentation fault in decoder" >&2
kill -SEGV $$
"#;

const FFMPEG_ENCODERS: &str = r#"#!/bin/sh
case "$1" in
  -version) echo "ffmpeg version 6.1-fake"; exit 0 ;;
  -hide_banner)
    echo " A....D aac                  AAC (Advanced Audio Coding)"
    echo " A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3)"
    exit 0 ;;
esac
exit 1
"#;

/// Scratch area with a fake toolchain and an input file.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("video_1.mp4"), b"not really a video").unwrap();
        let fixture = Self { dir };
        fixture.script("ffprobe", FFPROBE);
        fixture
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn converter(&self, ffmpeg_body: &str) -> FfmpegConverter {
        let ffmpeg = self.script("ffmpeg", ffmpeg_body);
        FfmpegConverter::new(
            ConverterConfig::with_paths(ffmpeg, self.dir.path().join("ffprobe"))
                .with_progress_interval(0),
        )
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("converted")
    }

    fn job(&self) -> ConversionJob {
        ConversionJob::new(
            "job-1",
            self.dir.path().join("video_1.mp4"),
            &self.output_dir(),
            AudioConstraints::default(),
        )
        .unwrap()
    }

    fn output(&self) -> PathBuf {
        self.output_dir().join("video_1.mp3")
    }
}

fn reporter() -> ProgressReporter<'static> {
    ProgressReporter::detached(StageLabel::new(Phase::Convert, 0, 1))
}

#[tokio::test]
async fn test_probe_reads_duration() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_OK);

    let info = converter
        .probe(&fixture.dir.path().join("video_1.mp4"))
        .await
        .unwrap();

    assert_eq!(info.format, "mov");
    assert!((info.duration_secs - 10.0).abs() < f64::EPSILON);
    assert_eq!(info.audio_codec.as_deref(), Some("aac"));
}

#[tokio::test]
async fn test_successful_conversion_forwards_progress() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_OK);

    let values = Arc::new(Mutex::new(Vec::new()));
    let values_clone = Arc::clone(&values);
    let sink = move |event: ProgressEvent| values_clone.lock().unwrap().push(event.percent);
    let progress = ProgressReporter::new(StageLabel::new(Phase::Convert, 0, 1), &sink);

    let result = converter
        .convert(fixture.job(), &CancellationToken::new(), &progress)
        .await
        .unwrap();

    assert_eq!(result.output_path, fixture.output());
    assert_eq!(result.output_format, "mp3");
    assert_eq!(result.input_format, "mov");
    assert_eq!(std::fs::read(fixture.output()).unwrap(), b"audio");
    assert_eq!(*values.lock().unwrap(), vec![50.0, 100.0]);
}

#[tokio::test]
async fn test_fault_is_reported_with_stderr() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_FAULT);

    let err = converter
        .convert(fixture.job(), &CancellationToken::new(), &reporter())
        .await
        .unwrap_err();

    assert!(!err.is_cancellation());
    match err {
        ConverterError::ConversionFailed { stderr, .. } => {
            assert!(stderr.unwrap_or_default().contains("Invalid data found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_cancel_kills_running_process() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_HANG);
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.request();
    });

    let start = Instant::now();
    let result = converter.convert(fixture.job(), &token, &reporter()).await;

    assert!(matches!(result, Err(ConverterError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_cancelled_token_never_spawns() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_OK);
    let token = CancellationToken::new();
    token.request();

    let result = converter.convert(fixture.job(), &token, &reporter()).await;

    assert!(matches!(result, Err(ConverterError::Cancelled)));
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_external_signal_is_termination() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_SELF_TERMINATE);

    let err = converter
        .convert(fixture.job(), &CancellationToken::new(), &reporter())
        .await
        .unwrap_err();

    assert!(matches!(err, ConverterError::Terminated { signal: 15 }));
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn test_crash_signal_is_fault() {
    let fixture = Fixture::new();
    let converter = fixture.converter(FFMPEG_CRASH);

    let err = converter
        .convert(fixture.job(), &CancellationToken::new(), &reporter())
        .await
        .unwrap_err();

    assert!(!err.is_cancellation());
    match err {
        ConverterError::ConversionFailed { reason, stderr } => {
            assert!(reason.contains("signal 11"), "reason: {}", reason);
            assert!(stderr.unwrap_or_default().contains("segmentation fault"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_crash_recorded_as_transcode_fault() {
    let fixture = Fixture::new();
    let base = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        MockDownloader::new(),
        fixture.converter(FFMPEG_CRASH),
    );

    let summary = pipeline
        .run_urls(
            ["https://media.example/item/1"],
            base.path(),
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.final_state, PipelineState::Done);
    assert_eq!(summary.transferred, 1);
    assert_eq!(summary.converted, 0);
    assert!(matches!(
        summary.transcodes[0].failure,
        Some(UnitFailure::TranscodeFault { .. })
    ));
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let fixture = Fixture::new();
    let ffmpeg = fixture.script("ffmpeg", FFMPEG_HANG);
    let converter = FfmpegConverter::new(
        ConverterConfig::with_paths(ffmpeg, fixture.dir.path().join("ffprobe")).with_timeout(1),
    );

    let result = converter
        .convert(fixture.job(), &CancellationToken::new(), &reporter())
        .await;

    assert!(matches!(result, Err(ConverterError::Timeout { timeout_secs: 1 })));
    assert!(!fixture.output().exists());
}

#[tokio::test]
async fn test_validate_checks_encoder() {
    let fixture = Fixture::new();
    let ffmpeg = fixture.script("ffmpeg", FFMPEG_ENCODERS);
    let ffprobe = fixture.dir.path().join("ffprobe");

    let mp3 = FfmpegConverter::new(ConverterConfig::with_paths(ffmpeg.clone(), ffprobe.clone()));
    tokio_test::assert_ok!(mp3.validate().await);

    let opus = FfmpegConverter::new(
        ConverterConfig::with_paths(ffmpeg, ffprobe).with_target_format(AudioFormat::Opus),
    );
    let result = opus.validate().await;
    assert!(matches!(result, Err(ConverterError::EncoderUnavailable { .. })));
}

#[tokio::test]
async fn test_missing_ffprobe_fails_validation() {
    let fixture = Fixture::new();
    let ffmpeg = fixture.script("ffmpeg", FFMPEG_ENCODERS);
    let converter = FfmpegConverter::new(ConverterConfig::with_paths(
        ffmpeg,
        Path::new("/nonexistent/ffprobe").to_path_buf(),
    ));

    let result = converter.validate().await;
    assert!(matches!(result, Err(ConverterError::FfprobeNotFound { .. })));
}
