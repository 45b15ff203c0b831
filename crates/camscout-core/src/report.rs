use crate::models::ZoomLevel;

/// Events emitted while crawling, for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    ViewsTotal {
        total_records: u64,
    },
    ViewsPage {
        offset: u64,
        received: usize,
    },
    ViewsDone {
        cameras_with_sources: usize,
        pages: u32,
    },
    JobProcessed {
        zoom: ZoomLevel,
        cameras: usize,
        clusters: usize,
        pending: usize,
        total_cameras: usize,
    },
    MalformedFeature {
        zoom: ZoomLevel,
        reason: &'a str,
    },
    ClusterAtZoomCap {
        zoom: ZoomLevel,
    },
    DiscoveryDone {
        cameras: usize,
        queries: u32,
        duplicates_skipped: u32,
    },
    Merged {
        cameras: usize,
        with_sources: usize,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl CrawlReporter for SilentReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::ViewsTotal { total_records } => {
                tracing::info!(%total_records, "Camera views listing");
            }
            CrawlEvent::ViewsPage { offset, received } => {
                tracing::info!(%offset, %received, "Fetched views page");
            }
            CrawlEvent::ViewsDone {
                cameras_with_sources,
                pages,
            } => {
                tracing::info!(%cameras_with_sources, %pages, "Views harvest complete");
            }
            CrawlEvent::JobProcessed {
                zoom,
                cameras,
                clusters,
                pending,
                total_cameras,
            } => {
                tracing::info!(%zoom, %cameras, %clusters, %pending, %total_cameras, "Map job processed");
            }
            CrawlEvent::MalformedFeature { zoom, reason } => {
                tracing::warn!(%zoom, %reason, "Skipping malformed map feature");
            }
            CrawlEvent::ClusterAtZoomCap { zoom } => {
                tracing::debug!(%zoom, "Cluster cannot be refined past the zoom cap");
            }
            CrawlEvent::DiscoveryDone {
                cameras,
                queries,
                duplicates_skipped,
            } => {
                tracing::info!(%cameras, %queries, %duplicates_skipped, "Discovery complete");
            }
            CrawlEvent::Merged {
                cameras,
                with_sources,
            } => {
                tracing::info!(%cameras, %with_sources, "Merged camera records");
            }
        }
    }
}
