//! Pipeline orchestrator: downloads a batch, then converts what arrived.
//!
//! A run walks `Idle -> DownloadPhase -> FilterPhase -> ConvertPhase -> Done`,
//! or ends in `Cancelled` once the run's token is requested. Items are
//! processed one at a time unless `max_concurrent_downloads` raises the
//! transfer limit; transcodes are always sequential. Per-item failures are
//! recorded in the [`RunSummary`] and never abort the batch.

mod config;
mod runner;
mod types;

pub use config::PipelineConfig;
pub use runner::Pipeline;
pub use types::{
    PipelineError, PipelineState, RunSummary, TranscodeOutcome, TransferOutcome, UnitFailure,
};
