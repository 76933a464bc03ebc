//! Transfer module: retrieves one remote resource into a local file.
//!
//! The `Downloader` trait is the seam the pipeline drives; `HttpDownloader`
//! streams the response body to disk chunk by chunk, reporting byte-level
//! progress when the server announces a length and stopping as soon as the
//! run's cancellation token is requested.
//!
//! # Example
//!
//! ```ignore
//! use harvester_core::transfer::{HttpDownloader, TransferConfig, TransferRequest, ResourceRef};
//!
//! let downloader = HttpDownloader::new(TransferConfig::default())?;
//! let request = TransferRequest {
//!     resource: ResourceRef::new("https://media.example/screen.mp4", 0),
//!     dest_dir: PathBuf::from("/data/downloads"),
//! };
//! let receipt = downloader.download(&request, &token, &progress).await?;
//! println!("wrote {} bytes to {:?}", receipt.bytes, receipt.path);
//! ```

mod config;
mod error;
mod http;
mod traits;
mod types;

pub use config::TransferConfig;
pub use error::TransferError;
pub use http::HttpDownloader;
pub use traits::Downloader;
pub use types::{transfer_file_name, ResourceRef, TransferReceipt, TransferRequest};
