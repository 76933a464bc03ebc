pub mod cancel;
pub mod config;
pub mod converter;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod testing;
pub mod transfer;

pub use cancel::{CancellationToken, Subscription};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError,
};
pub use converter::{
    AudioConstraints, AudioFormat, ConversionJob, ConversionResult, Converter, ConverterConfig,
    ConverterError, FfmpegConverter, MediaInfo,
};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineState, RunSummary, TranscodeOutcome,
    TransferOutcome, UnitFailure,
};
pub use progress::{NullSink, Phase, ProgressEvent, ProgressReporter, ProgressSink, StageLabel};
pub use transfer::{
    Downloader, HttpDownloader, ResourceRef, TransferConfig, TransferError, TransferReceipt,
    TransferRequest,
};
