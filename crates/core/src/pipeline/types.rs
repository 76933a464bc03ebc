//! Types for the pipeline module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::converter::ConverterError;
use crate::transfer::TransferError;

/// Fatal errors that end a run.
///
/// Per-item failures never show up here; they are recorded in the outcomes.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A working directory could not be created.
    #[error("Failed to create working directory {path}")]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    DownloadPhase,
    FilterPhase,
    ConvertPhase,
    Done,
    Cancelled,
}

impl PipelineState {
    /// Returns true if the run has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Stable lowercase name, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DownloadPhase => "download_phase",
            Self::FilterPhase => "filter_phase",
            Self::ConvertPhase => "convert_phase",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single item did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitFailure {
    /// The remote side rejected or broke the transfer.
    Remote {
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        reason: String,
    },
    /// Writing the transferred file failed.
    TransferIo { reason: String },
    /// ffmpeg reported a genuine processing error.
    TranscodeFault { reason: String },
    /// The unit stopped because cancellation was requested.
    Cancelled,
}

impl UnitFailure {
    /// Label used for the `result` metric dimension.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote_error",
            Self::TransferIo { .. } => "io_error",
            Self::TranscodeFault { .. } => "fault",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { reason, .. }
            | Self::TransferIo { reason }
            | Self::TranscodeFault { reason } => f.write_str(reason),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl From<&TransferError> for UnitFailure {
    fn from(e: &TransferError) -> Self {
        match e {
            TransferError::Remote { status, .. } => Self::Remote {
                status: Some(*status),
                reason: e.to_string(),
            },
            TransferError::InvalidUrl { .. } | TransferError::Network(_) => Self::Remote {
                status: None,
                reason: e.to_string(),
            },
            TransferError::Io { path, source } => Self::TransferIo {
                reason: format!("{}: {}", path.display(), source),
            },
            TransferError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<&ConverterError> for UnitFailure {
    fn from(e: &ConverterError) -> Self {
        if e.is_cancellation() {
            return Self::Cancelled;
        }
        let reason = match e {
            ConverterError::ConversionFailed {
                reason,
                stderr: Some(stderr),
            } => format!("{}: {}", reason, stderr),
            other => other.to_string(),
        };
        Self::TranscodeFault { reason }
    }
}

/// Result of one Transfer Unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub succeeded: bool,
    /// Written file, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Locator of the resource this outcome belongs to.
    pub label: String,
    /// Zero-based position in the batch.
    pub ordinal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<UnitFailure>,
}

impl TransferOutcome {
    pub fn success(label: impl Into<String>, ordinal: usize, local_path: PathBuf) -> Self {
        Self {
            succeeded: true,
            local_path: Some(local_path),
            label: label.into(),
            ordinal,
            failure: None,
        }
    }

    pub fn failure(label: impl Into<String>, ordinal: usize, failure: UnitFailure) -> Self {
        Self {
            succeeded: false,
            local_path: None,
            label: label.into(),
            ordinal,
            failure: Some(failure),
        }
    }

    /// Value of the `result` metric dimension.
    pub fn metric_label(&self) -> &'static str {
        self.failure
            .as_ref()
            .map_or("success", UnitFailure::metric_label)
    }
}

/// Result of one Transcode Unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeOutcome {
    pub succeeded: bool,
    /// File name of the transferred source.
    pub label: String,
    /// Source file that was transcoded.
    pub source_path: PathBuf,
    /// Written derivative, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<UnitFailure>,
}

impl TranscodeOutcome {
    pub fn success(label: impl Into<String>, source_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            succeeded: true,
            label: label.into(),
            source_path,
            output_path: Some(output_path),
            failure: None,
        }
    }

    pub fn failure(label: impl Into<String>, source_path: PathBuf, failure: UnitFailure) -> Self {
        Self {
            succeeded: false,
            label: label.into(),
            source_path,
            output_path: None,
            failure: Some(failure),
        }
    }

    /// Value of the `result` metric dimension.
    pub fn metric_label(&self) -> &'static str {
        self.failure
            .as_ref()
            .map_or("success", UnitFailure::metric_label)
    }
}

/// Aggregate tally returned when a run reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items in the requested batch.
    pub batch_size: usize,
    /// Transfer Units started.
    pub attempted: usize,
    /// Transfers that succeeded.
    pub transferred: usize,
    /// Transcodes that succeeded.
    pub converted: usize,
    pub final_state: PipelineState,
    pub transfers: Vec<TransferOutcome>,
    pub transcodes: Vec<TranscodeOutcome>,
}

impl RunSummary {
    pub(crate) fn new(
        batch_size: usize,
        final_state: PipelineState,
        transfers: Vec<TransferOutcome>,
        transcodes: Vec<TranscodeOutcome>,
    ) -> Self {
        Self {
            batch_size,
            attempted: transfers.len(),
            transferred: transfers.iter().filter(|t| t.succeeded).count(),
            converted: transcodes.iter().filter(|t| t.succeeded).count(),
            final_state,
            transfers,
            transcodes,
        }
    }

    /// Returns true if the run was stopped by a cancellation request.
    pub fn was_cancelled(&self) -> bool {
        self.final_state == PipelineState::Cancelled
    }
}
