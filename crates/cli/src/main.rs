use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester_core::{
    load_config_or_default, metrics, validate_config, CancellationToken, Converter,
    FfmpegConverter, HttpDownloader, Pipeline, ProgressEvent, RunSummary,
};

/// Download media files and extract their audio with ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "harvester", author, version, about, long_about = None)]
struct Args {
    /// URLs to fetch, in batch order
    urls: Vec<String>,

    /// File with one URL per line (`#` starts a comment)
    #[arg(long, value_name = "PATH")]
    urls_file: Option<PathBuf>,

    /// Base directory receiving the downloads and converted folders
    #[arg(short, long, value_name = "DIR")]
    dest: PathBuf,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Write a Prometheus metrics snapshot here after the run
    #[arg(long, value_name = "PATH")]
    metrics_out: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.log_json);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    // Logs go to stderr so stdout only carries the summary.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    match &args.config {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No configuration file given, using defaults"),
    }
    let config = load_config_or_default(args.config.as_deref()).with_context(|| {
        format!(
            "Failed to load config from {:?}",
            args.config.as_deref().unwrap_or(Path::new("<defaults>"))
        )
    })?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let urls = collect_urls(&args.urls, args.urls_file.as_deref()).await?;
    info!("Batch of {} URL(s) into {:?}", urls.len(), args.dest);

    let converter = FfmpegConverter::new(config.converter.clone());
    if !urls.is_empty() {
        converter
            .validate()
            .await
            .context("ffmpeg is not usable")?;
        info!(
            "Using {} converter, target format {:?}",
            converter.name(),
            config.converter.target_format
        );
    }

    let downloader =
        HttpDownloader::new(config.transfer.clone()).context("Failed to create HTTP client")?;
    let pipeline = Pipeline::new(config.pipeline.clone(), downloader, converter);

    // One token for this run
    let token = CancellationToken::new();
    let _cancel_notice =
        token.on_requested(|| warn!("Cancellation requested, stopping after the current step"));
    let signal_task = tokio::spawn(escalate_signals(shutdown_signal, token.clone()));

    // Relay progress to the log
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let progress_task = tokio::spawn(async move {
        let mut current_stage = String::new();
        while let Some(event) = progress_rx.recv().await {
            if event.stage != current_stage {
                info!("{}", event.stage);
                current_stage = event.stage.clone();
            }
            debug!("{}: {:.1}%", event.stage, event.percent);
        }
    });

    let result = pipeline
        .run_urls(urls, &args.dest, &progress_tx, &token)
        .await;

    drop(progress_tx);
    if let Err(e) = progress_task.await {
        warn!("Progress relay stopped abnormally: {}", e);
    }
    signal_task.abort();

    let summary = result.context("Pipeline run failed")?;
    print_summary(&summary, args.json)?;

    if let Some(path) = &args.metrics_out {
        let text = metrics::encode_metrics().context("Failed to encode metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!("Metrics written to {:?}", path);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{}: {} of {} transferred, {} converted",
        summary.final_state, summary.transferred, summary.attempted, summary.converted
    );
    for transfer in summary.transfers.iter().filter(|t| !t.succeeded) {
        if let Some(failure) = &transfer.failure {
            println!("  download failed: {} ({})", transfer.label, failure);
        }
    }
    for transcode in summary.transcodes.iter().filter(|t| !t.succeeded) {
        if let Some(failure) = &transcode.failure {
            println!("  conversion failed: {} ({})", transcode.label, failure);
        }
    }
    Ok(())
}

/// Positional URLs first, then the ones listed in `file`.
async fn collect_urls(positional: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut urls = positional.to_vec();
    if let Some(path) = file {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read URL list {:?}", path))?;
        urls.extend(parse_url_list(&content));
    }
    Ok(urls)
}

fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// First signal requests cancellation; a second one exits the process.
///
/// Units that never look at the token (a hung ffprobe, say) can only be
/// stopped this way.
async fn escalate_signals<S, F>(next_signal: S, token: CancellationToken)
where
    S: FnMut() -> F,
    F: Future<Output = ()>,
{
    wait_for_second_signal(next_signal, &token).await;
    warn!("Second interrupt received, exiting without cleanup");
    std::process::exit(130);
}

async fn wait_for_second_signal<S, F>(mut next_signal: S, token: &CancellationToken)
where
    S: FnMut() -> F,
    F: Future<Output = ()>,
{
    next_signal().await;
    if !token.request() {
        debug!("Cancellation already requested");
    }
    next_signal().await;
}

/// Wait for a cancellation signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
