use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::models::{Endpoint, Region, ZoomLevel};
use crate::retry::RetryPolicy;

pub const DEFAULT_MAP_URL: &str = "https://www.cotrip.org/api/graphql";
pub const DEFAULT_VIEWS_URL: &str = "https://maps.cotrip.org/api/graphql";
pub const DEFAULT_START_ZOOM: u32 = 7;
pub const DEFAULT_MAX_ZOOM: u32 = 16;
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// Colorado statewide bounding box.
pub fn default_region() -> Region {
    Region::new_unchecked(-109.0603, 36.9924, -102.0415, 41.0034)
}

pub fn default_map_endpoint() -> Endpoint {
    Endpoint::new(DEFAULT_MAP_URL)
        .with_header("content-type", "application/json")
        .with_header("origin", "https://www.cotrip.org")
        .with_header(
            "referer",
            "https://www.cotrip.org/travel-information/traveler-information-system-map/",
        )
        .with_header("user-agent", "Mozilla/5.0")
}

pub fn default_views_endpoint() -> Endpoint {
    Endpoint::new(DEFAULT_VIEWS_URL)
        .with_header("content-type", "application/json")
        .with_header("origin", "https://maps.cotrip.org")
        .with_header("user-agent", "Mozilla/5.0")
}

/// Settings for the camera-views listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewsQueryConfig {
    pub page_size: u32,
    pub sort_direction: String,
    pub sort_type: String,
    pub free_search_term: String,
    pub classification_filter: Vec<String>,
    /// Pause between page requests.
    pub page_delay: Duration,
}

impl Default for ViewsQueryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sort_direction: "DESC".to_string(),
            sort_type: "ROADWAY".to_string(),
            free_search_term: String::new(),
            classification_filter: Vec::new(),
            page_delay: Duration::from_millis(100),
        }
    }
}

/// Settings for cluster-expansion discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    pub start_zoom: ZoomLevel,
    pub max_zoom: ZoomLevel,
    pub layer_filter: Vec<String>,
    pub non_clusterable_uris: Vec<String>,
    /// Pause after each processed frontier job.
    pub job_delay: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            start_zoom: ZoomLevel::new(DEFAULT_START_ZOOM),
            max_zoom: ZoomLevel::new(DEFAULT_MAX_ZOOM),
            layer_filter: vec!["normalCameras".to_string()],
            non_clusterable_uris: vec![
                "travel-information/traveler-information-system-map".to_string(),
            ],
            job_delay: Duration::from_millis(50),
        }
    }
}

/// Everything one harvest run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlConfig {
    pub region: Region,
    pub map_endpoint: Endpoint,
    pub views_endpoint: Endpoint,
    pub views: ViewsQueryConfig,
    pub discovery: DiscoveryConfig,
    pub retry: RetryPolicy,
    /// HTTP timeout per request.
    pub request_timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            map_endpoint: default_map_endpoint(),
            views_endpoint: default_views_endpoint(),
            views: ViewsQueryConfig::default(),
            discovery: DiscoveryConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(45),
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_endpoint_url(&self.map_endpoint.url)?;
        validate_endpoint_url(&self.views_endpoint.url)?;

        if self.views.page_size == 0 {
            return Err(AppError::ConfigError("page_size must be at least 1".into()));
        }
        if self.discovery.max_zoom < self.discovery.start_zoom {
            return Err(AppError::ConfigError(format!(
                "max_zoom ({}) must be >= start_zoom ({})",
                self.discovery.max_zoom, self.discovery.start_zoom
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "request_timeout must be positive".into(),
            ));
        }
        self.retry.validate()
    }
}

/// Only absolute http/https URLs are accepted as endpoints.
fn validate_endpoint_url(raw: &str) -> Result<(), AppError> {
    let parsed =
        Url::parse(raw).map_err(|e| AppError::ConfigError(format!("Invalid URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::ConfigError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
