//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Transfers (results, bytes, duration)
//! - Transcodes (results, duration)
//! - Pipeline runs (terminal state)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

/// Registry holding every core metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
    registry
});

// =============================================================================
// Transfer Metrics
// =============================================================================

/// Transfers finished, by result.
pub static TRANSFERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_transfers_total", "Total transfers by result"),
        &["result"], // "success", "remote_error", "io_error", "cancelled"
    )
    .unwrap()
});

/// Bytes written to disk by transfers.
pub static BYTES_TRANSFERRED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_bytes_transferred_total",
        "Total bytes written by transfers",
    )
    .unwrap()
});

/// Transfer duration in seconds.
pub static TRANSFER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_transfer_duration_seconds",
            "Duration of single transfers",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Transcode Metrics
// =============================================================================

/// Transcodes finished, by result.
pub static TRANSCODES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_transcodes_total", "Total transcodes by result"),
        &["result"], // "success", "fault", "cancelled"
    )
    .unwrap()
});

/// Transcode duration in seconds.
pub static TRANSCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_transcode_duration_seconds",
            "Duration of single transcodes",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Pipeline runs, by terminal state.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_runs_total", "Total pipeline runs by final state"),
        &["state"], // "done", "cancelled"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Transfers
        Box::new(TRANSFERS_TOTAL.clone()),
        Box::new(BYTES_TRANSFERRED.clone()),
        Box::new(TRANSFER_DURATION.clone()),
        // Transcodes
        Box::new(TRANSCODES_TOTAL.clone()),
        Box::new(TRANSCODE_DURATION.clone()),
        // Runs
        Box::new(RUNS_TOTAL.clone()),
    ]
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
