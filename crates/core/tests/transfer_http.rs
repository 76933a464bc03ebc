//! HTTP transfer integration tests against an in-process server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    http::{self, header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use futures::stream;
use tempfile::TempDir;

use harvester_core::{
    testing::MockConverter, CancellationToken, Downloader, HttpDownloader, NullSink, Phase,
    Pipeline, PipelineConfig, PipelineState, ProgressEvent, ProgressReporter, ResourceRef,
    StageLabel, TransferConfig, TransferError, TransferRequest, UnitFailure,
};

const BODY_LEN: usize = 256 * 1024;

async fn unknown_length() -> Response {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from(vec![1u8; 1024])),
        Ok(Bytes::from(vec![2u8; 1024])),
    ];
    http::Response::builder()
        .body(Body::from_stream(stream::iter(chunks)))
        .unwrap()
}

async fn stall() -> Response {
    // Announces far more than it ever sends.
    let first: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from(vec![3u8; 4096]))];
    let body = futures::StreamExt::chain(
        stream::iter(first),
        stream::pending::<Result<Bytes, std::io::Error>>(),
    );
    http::Response::builder()
        .header(header::CONTENT_LENGTH, "10000000")
        .body(Body::from_stream(body))
        .unwrap()
}

/// Spawn the test server and return its address
async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/ok.mp4", get(|| async { vec![7u8; BODY_LEN] }))
        .route("/missing.mp4", get(|| async { StatusCode::NOT_FOUND }))
        .route("/unknown-length.mp4", get(unknown_length))
        .route("/stall.mp4", get(stall));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn request(addr: SocketAddr, path: &str, dir: &TempDir) -> TransferRequest {
    TransferRequest {
        resource: ResourceRef::new(format!("http://{}{}", addr, path), 0),
        dest_dir: dir.path().to_path_buf(),
    }
}

fn collecting_sink() -> (impl Fn(ProgressEvent) + Send + Sync, Arc<Mutex<Vec<f32>>>) {
    let values = Arc::new(Mutex::new(Vec::new()));
    let values_clone = Arc::clone(&values);
    let sink = move |event: ProgressEvent| values_clone.lock().unwrap().push(event.percent);
    (sink, values)
}

#[tokio::test]
async fn test_download_writes_file_with_progress() {
    let addr = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::with_defaults().unwrap();
    let (sink, values) = collecting_sink();
    let progress = ProgressReporter::new(StageLabel::new(Phase::Download, 0, 1), &sink);

    let receipt = downloader
        .download(&request(addr, "/ok.mp4", &dir), &CancellationToken::new(), &progress)
        .await
        .unwrap();

    assert_eq!(receipt.path, dir.path().join("video_1.mp4"));
    assert_eq!(receipt.bytes, BODY_LEN as u64);
    assert_eq!(receipt.total_bytes, Some(BODY_LEN as u64));
    assert_eq!(std::fs::metadata(&receipt.path).unwrap().len(), BODY_LEN as u64);

    let values = values.lock().unwrap().clone();
    assert!(!values.is_empty());
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(values.last().copied(), Some(100.0));
}

#[tokio::test]
async fn test_non_success_status_creates_no_file() {
    let addr = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::with_defaults().unwrap();
    let progress = ProgressReporter::detached(StageLabel::new(Phase::Download, 0, 1));

    let result = downloader
        .download(
            &request(addr, "/missing.mp4", &dir),
            &CancellationToken::new(),
            &progress,
        )
        .await;

    assert!(matches!(result, Err(TransferError::Remote { status: 404, .. })));
    assert!(!dir.path().join("video_1.mp4").exists());
}

#[tokio::test]
async fn test_unknown_length_emits_no_percent() {
    let addr = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::with_defaults().unwrap();
    let (sink, values) = collecting_sink();
    let progress = ProgressReporter::new(StageLabel::new(Phase::Download, 0, 1), &sink);

    let receipt = downloader
        .download(
            &request(addr, "/unknown-length.mp4", &dir),
            &CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(receipt.bytes, 2048);
    assert_eq!(receipt.total_bytes, None);
    assert!(values.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_transfer_removes_partial_file() {
    let addr = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::with_defaults().unwrap();
    let token = CancellationToken::new();

    // Cancel as soon as the first chunk has been written.
    let cancel = token.clone();
    let sink = move |event: ProgressEvent| {
        if event.percent > 0.0 {
            cancel.request();
        }
    };
    let progress = ProgressReporter::new(StageLabel::new(Phase::Download, 0, 1), &sink);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        downloader.download(&request(addr, "/stall.mp4", &dir), &token, &progress),
    )
    .await
    .expect("stalled read was not abandoned");

    assert!(matches!(result, Err(TransferError::Cancelled)));
    assert!(!dir.path().join("video_1.mp4").exists());
}

#[tokio::test]
async fn test_keep_partial_files() {
    let addr = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let downloader =
        HttpDownloader::new(TransferConfig::default().with_keep_partial_files(true)).unwrap();
    let token = CancellationToken::new();

    let cancel = token.clone();
    let sink = move |event: ProgressEvent| {
        if event.percent > 0.0 {
            cancel.request();
        }
    };
    let progress = ProgressReporter::new(StageLabel::new(Phase::Download, 0, 1), &sink);

    let result = downloader
        .download(&request(addr, "/stall.mp4", &dir), &token, &progress)
        .await;

    assert!(matches!(result, Err(TransferError::Cancelled)));
    let kept = std::fs::metadata(dir.path().join("video_1.mp4")).unwrap().len();
    assert!(kept > 0 && kept <= 4096);
}

#[tokio::test]
async fn test_stalled_body_hits_read_timeout() {
    let addr = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::new(TransferConfig::default().with_read_timeout(1)).unwrap();
    let progress = ProgressReporter::detached(StageLabel::new(Phase::Download, 0, 1));

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        downloader.download(
            &request(addr, "/stall.mp4", &dir),
            &CancellationToken::new(),
            &progress,
        ),
    )
    .await
    .expect("read timeout did not fire");

    assert!(matches!(result, Err(TransferError::Network(_))));
    assert!(!dir.path().join("video_1.mp4").exists());
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let dir = TempDir::new().unwrap();
    let downloader = HttpDownloader::with_defaults().unwrap();
    let progress = ProgressReporter::detached(StageLabel::new(Phase::Download, 0, 1));

    let result = downloader
        .download(&request(addr, "/ok.mp4", &dir), &CancellationToken::new(), &progress)
        .await;

    assert!(matches!(result, Err(TransferError::Network(_))));
    assert!(!dir.path().join("video_1.mp4").exists());
}

#[tokio::test]
async fn test_pipeline_over_http_skips_failed_item() {
    let addr = spawn_server().await;
    let base = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        HttpDownloader::with_defaults().unwrap(),
        MockConverter::new(),
    );

    let summary = pipeline
        .run_urls(
            [
                format!("http://{}/missing.mp4", addr),
                format!("http://{}/ok.mp4", addr),
            ],
            base.path(),
            &NullSink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.final_state, PipelineState::Done);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.transferred, 1);
    assert_eq!(summary.converted, 1);
    assert!(matches!(
        summary.transfers[0].failure,
        Some(UnitFailure::Remote {
            status: Some(404),
            ..
        })
    ));
    assert!(base.path().join("downloads/video_2.mp4").exists());
    assert!(base.path().join("converted/video_2.mp3").exists());
}
