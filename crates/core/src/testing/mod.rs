//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the unit traits, allowing
//! pipeline runs to be exercised without a network or an ffmpeg install.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvester_core::testing::{MockConverter, MockDownloader};
//!
//! let downloader = MockDownloader::new();
//! let converter = MockConverter::new();
//!
//! // Configure mock responses
//! downloader.fail_with_status("https://media.example/a", 404).await;
//! converter.fail_file("video_2.mp4", "Invalid data found").await;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), downloader, converter);
//! ```

mod mock_converter;
mod mock_downloader;

pub use mock_converter::{MockConvertFailure, MockConverter, RecordedConversion};
pub use mock_downloader::{MockDownloader, MockTransfer, RecordedTransfer};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::{Arc, Mutex};

    use crate::progress::ProgressEvent;

    /// Batch of `n` distinct locators.
    pub fn urls(n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| format!("https://media.example/item/{}", i))
            .collect()
    }

    /// Progress sink that keeps every event for later inspection.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        events: Arc<Mutex<Vec<ProgressEvent>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of the events received so far.
        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events
                .lock()
                .map(|events| events.clone())
                .unwrap_or_default()
        }

        /// Events grouped by stage, in arrival order.
        pub fn by_stage(&self) -> Vec<(String, Vec<f32>)> {
            let mut grouped: Vec<(String, Vec<f32>)> = Vec::new();
            for event in self.events() {
                match grouped.last_mut() {
                    Some((stage, values)) if *stage == event.stage => values.push(event.percent),
                    _ => grouped.push((event.stage, vec![event.percent])),
                }
            }
            grouped
        }
    }

    impl crate::progress::ProgressSink for RecordingSink {
        fn report(&self, event: ProgressEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event);
            }
        }
    }
}
