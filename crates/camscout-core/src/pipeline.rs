use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::CrawlConfig;
use crate::discovery::{ClusterExpander, Discovery};
use crate::error::AppError;
use crate::harvester::ViewHarvester;
use crate::merge::merge;
use crate::models::{CameraDataset, SourceMap};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::retry::ResilientClient;
use crate::traits::{DatasetSink, Transport};

/// Orchestrates a full harvest: views listing + cluster discovery → merge → dataset.
///
/// Generic over the transport so the whole pipeline can run against a mock.
/// The two upstream stages share nothing and run concurrently; a fatal
/// error in either aborts the run and no partial dataset is produced.
pub struct CameraPipeline<T> {
    harvester: ViewHarvester<T>,
    expander: ClusterExpander<T>,
    config: CrawlConfig,
}

impl<T: Transport> CameraPipeline<T> {
    /// Validate `config` and wire both stages onto one resilient client.
    pub fn new(transport: T, config: CrawlConfig) -> Result<Self, AppError> {
        config.validate()?;

        let client = ResilientClient::new(transport, config.retry.clone());
        let harvester = ViewHarvester::new(
            client.clone(),
            config.views_endpoint.clone(),
            config.region,
            config.views.clone(),
        );
        let expander = ClusterExpander::new(
            client,
            config.map_endpoint.clone(),
            config.discovery.clone(),
        );

        Ok(Self {
            harvester,
            expander,
            config,
        })
    }

    /// Only the paginated views listing.
    pub async fn run_views<R: CrawlReporter>(
        &self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<SourceMap, AppError> {
        self.harvester.harvest_sources(cancel, reporter).await
    }

    /// Only the spatial cluster expansion over the configured region.
    pub async fn run_discovery<R: CrawlReporter>(
        &self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<Discovery, AppError> {
        self.expander
            .discover_cameras(self.config.region, cancel, reporter)
            .await
    }

    /// Run both stages, join them and return the merged dataset.
    pub async fn run<R: CrawlReporter>(
        &self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<CameraDataset, AppError> {
        let (sources, discovery) = tokio::try_join!(
            self.run_views(cancel, reporter),
            self.run_discovery(cancel, reporter),
        )?;

        let cameras = merge(&discovery.cameras, &sources);
        let dataset = CameraDataset {
            generated_at: Utc::now(),
            region: self.config.region,
            cameras,
        };

        reporter.report(CrawlEvent::Merged {
            cameras: dataset.count(),
            with_sources: dataset.with_sources_count(),
        });

        Ok(dataset)
    }

    /// [`run`](Self::run), then hand the dataset to `sink`.
    pub async fn run_to_sink<R, S>(
        &self,
        sink: &S,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<CameraDataset, AppError>
    where
        R: CrawlReporter,
        S: DatasetSink,
    {
        let dataset = self.run(cancel, reporter).await?;
        sink.write(&dataset)?;
        tracing::info!(cameras = dataset.count(), "Dataset written");
        Ok(dataset)
    }
}
