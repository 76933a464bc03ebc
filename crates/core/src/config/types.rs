use serde::{Deserialize, Serialize};

pub use crate::converter::ConverterConfig;
pub use crate::pipeline::PipelineConfig;
pub use crate::transfer::TransferConfig;

/// Root configuration
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}
