//! Progress reporting.
//!
//! Units report a percentage for the item they are working on; the pipeline
//! tags every value with a stage label and forwards it to a [`ProgressSink`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One progress update, as delivered to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Phase name and item position, e.g. "downloading item 2 of 5".
    pub stage: String,
    /// Percent complete for the current item, in `[0, 100]`.
    pub percent: f32,
}

/// Consumer of progress events.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // A closed receiver means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// The two phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Download,
    Convert,
}

impl Phase {
    fn verb(&self) -> &'static str {
        match self {
            Self::Download => "downloading",
            Self::Convert => "converting",
        }
    }
}

/// Label identifying the phase and the item position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageLabel {
    pub phase: Phase,
    /// Zero-based position of the item within the phase.
    pub position: usize,
    /// Number of items in the phase.
    pub total: usize,
}

impl StageLabel {
    pub fn new(phase: Phase, position: usize, total: usize) -> Self {
        Self {
            phase,
            position,
            total,
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} item {} of {}",
            self.phase.verb(),
            self.position + 1,
            self.total
        )
    }
}

/// Progress handle given to one unit for the lifetime of one item.
///
/// Values are clamped to `[0, 100]` and never go backwards: a value lower
/// than the last emitted one is dropped.
pub struct ProgressReporter<'a> {
    stage: String,
    sink: &'a dyn ProgressSink,
    // f32 bits; starts below any valid percent
    last: AtomicU32,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(label: StageLabel, sink: &'a dyn ProgressSink) -> Self {
        Self {
            stage: label.to_string(),
            sink,
            last: AtomicU32::new((-1.0f32).to_bits()),
        }
    }

    /// A reporter that goes nowhere, for callers that do not track progress.
    pub fn detached(label: StageLabel) -> ProgressReporter<'static> {
        ProgressReporter::new(label, &NullSink)
    }

    /// The stage label attached to every event.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Emits the 0% event that opens a unit.
    pub fn start(&self) {
        self.update(0.0);
    }

    /// Emits `percent` if it does not move progress backwards.
    pub fn update(&self, percent: f32) {
        if !percent.is_finite() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);

        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            if percent < f32::from_bits(current) {
                return;
            }
            match self.last.compare_exchange_weak(
                current,
                percent.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        self.sink.report(ProgressEvent {
            stage: self.stage.clone(),
            percent,
        });
    }

    /// Last value emitted, if any.
    pub fn last_percent(&self) -> Option<f32> {
        let value = f32::from_bits(self.last.load(Ordering::Relaxed));
        (value >= 0.0).then_some(value)
    }
}
