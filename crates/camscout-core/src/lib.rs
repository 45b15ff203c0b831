pub mod config;
pub mod discovery;
pub mod error;
pub mod frontier;
pub mod graphql;
pub mod harvester;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod traits;
pub mod util;

#[cfg(test)]
mod testutil;

pub use config::CrawlConfig;
pub use discovery::{ClusterExpander, Discovery, DiscoveryStats};
pub use error::AppError;
pub use harvester::ViewHarvester;
pub use models::{CameraDataset, CameraRecord, Endpoint, MediaSource, Region, ZoomLevel};
pub use pipeline::CameraPipeline;
pub use report::{CrawlEvent, CrawlReporter, SilentReporter, TracingCrawlReporter};
pub use retry::{ResilientClient, RetryPolicy};
pub use traits::{DatasetSink, Transport, TransportResponse};
