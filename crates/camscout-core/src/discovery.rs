//! Cluster-expansion camera discovery.
//!
//! Starting from one region at a coarse zoom, every cluster returned by the
//! map-features endpoint is re-queried over its own bbox at a deeper zoom
//! until only individual cameras remain or the zoom cap is reached.
//!
//! Termination: every child job is strictly deeper than its parent, zoom is
//! bounded by `max_zoom`, and the frontier never processes a (bbox, zoom)
//! key twice.

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;
use crate::error::AppError;
use crate::frontier::{Frontier, next_zoom};
use crate::graphql::{
    GraphQlPayload, GraphQlRequest, ensure_no_errors, ensure_no_query_error, query_result,
};
use crate::models::{
    CameraMap, CameraPartial, ClusterNode, Endpoint, ExpansionJob, GeoPoint, MapFeature, Region,
    ZoomLevel,
};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::retry::ResilientClient;
use crate::traits::Transport;
use crate::util::{ensure_not_cancelled, sleep_or_cancel};

const MAP_FEATURES_QUERY: &str = r#"
query MapFeatures($input: MapFeaturesArgs!) {
  mapFeaturesQuery(input: $input) {
    mapFeatures {
      __typename
      uri
      title
      bbox
      ... on Camera { active }
      ... on Cluster { maxZoom }
      features { id geometry type }
    }
    error { message type }
  }
}
"#;

const MAP_FEATURES_FIELD: &str = "mapFeaturesQuery";

/// Counters describing one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub queries: u32,
    pub duplicates_skipped: u32,
    pub clusters_at_zoom_cap: u32,
    pub malformed_features: u32,
    pub deepest_zoom: Option<ZoomLevel>,
}

/// Result of [`ClusterExpander::discover_cameras`].
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub cameras: CameraMap,
    pub stats: DiscoveryStats,
}

/// Drives the frontier against the map-features endpoint.
pub struct ClusterExpander<T> {
    client: ResilientClient<T>,
    endpoint: Endpoint,
    config: DiscoveryConfig,
    query: String,
}

impl<T: Transport> ClusterExpander<T> {
    pub fn new(client: ResilientClient<T>, endpoint: Endpoint, config: DiscoveryConfig) -> Self {
        let query = MAP_FEATURES_QUERY
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            client,
            endpoint,
            config,
            query,
        }
    }

    /// Query the map features of one job. Returns the raw feature objects.
    pub async fn fetch_features(
        &self,
        job: &ExpansionJob,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, AppError> {
        let variables = json!({
            "input": {
                "north": job.region.north(),
                "south": job.region.south(),
                "east": job.region.east(),
                "west": job.region.west(),
                "zoom": job.zoom.get(),
                "layerSlugs": self.config.layer_filter,
                "nonClusterableUris": self.config.non_clusterable_uris,
            }
        });
        let payload =
            GraphQlPayload::Batch(vec![GraphQlRequest::new(self.query.clone(), variables)]);

        let response = self.client.send(&self.endpoint, &payload, cancel).await?;

        let first = response
            .as_array()
            .and_then(|items| items.first())
            .ok_or_else(|| {
                AppError::ProtocolError(format!("Unexpected batch response: {response}"))
            })?;

        ensure_no_errors(first)?;
        let result = query_result(first, MAP_FEATURES_FIELD)?;
        ensure_no_query_error(result)?;

        Ok(result
            .get("mapFeatures")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Expand `initial` breadth-first until the frontier is empty.
    ///
    /// A camera seen again from another job overwrites the earlier entry.
    /// Malformed features are skipped; any request failure aborts the run.
    pub async fn discover_cameras<R: CrawlReporter>(
        &self,
        initial: Region,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<Discovery, AppError> {
        let start_zoom = self.config.start_zoom;
        let max_zoom = self.config.max_zoom;
        if max_zoom < start_zoom {
            return Err(AppError::ConfigError(format!(
                "max_zoom ({max_zoom}) must be >= start_zoom ({start_zoom})"
            )));
        }

        let mut frontier = Frontier::new(ExpansionJob::new(initial, start_zoom));
        let mut cameras = CameraMap::new();
        let mut stats = DiscoveryStats::default();

        loop {
            ensure_not_cancelled(cancel)?;
            let Some(job) = frontier.pop_unvisited() else {
                break;
            };

            let items = self.fetch_features(&job, cancel).await?;
            stats.queries += 1;
            stats.deepest_zoom = stats.deepest_zoom.max(Some(job.zoom));

            let mut camera_count = 0;
            let mut cluster_count = 0;

            for item in &items {
                match decode_feature(item) {
                    Ok(Some(MapFeature::Camera(camera))) => {
                        camera_count += 1;
                        cameras.insert(camera.id.clone(), camera);
                    }
                    Ok(Some(MapFeature::Cluster(cluster))) => {
                        cluster_count += 1;
                        match next_zoom(job.zoom, cluster.suggested_zoom, max_zoom) {
                            Some(zoom) => frontier.push(ExpansionJob::new(cluster.region, zoom)),
                            None => {
                                stats.clusters_at_zoom_cap += 1;
                                reporter.report(CrawlEvent::ClusterAtZoomCap { zoom: job.zoom });
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(reason) => {
                        stats.malformed_features += 1;
                        reporter.report(CrawlEvent::MalformedFeature {
                            zoom: job.zoom,
                            reason: &reason,
                        });
                    }
                }
            }

            reporter.report(CrawlEvent::JobProcessed {
                zoom: job.zoom,
                cameras: camera_count,
                clusters: cluster_count,
                pending: frontier.pending(),
                total_cameras: cameras.len(),
            });

            sleep_or_cancel(self.config.job_delay, cancel).await?;
        }

        stats.duplicates_skipped = frontier.duplicates_skipped();
        reporter.report(CrawlEvent::DiscoveryDone {
            cameras: cameras.len(),
            queries: stats.queries,
            duplicates_skipped: stats.duplicates_skipped,
        });

        Ok(Discovery { cameras, stats })
    }
}

/// Decode one raw map feature.
///
/// `Ok(None)` for items without a `__typename` or with a type other than
/// `Camera` and `Cluster`. `Err` with a reason for cameras without an id and
/// clusters without a usable bbox. Other attributes of the wrong type are
/// treated as absent.
pub fn decode_feature(item: &Value) -> Result<Option<MapFeature>, String> {
    match item.get("__typename").and_then(Value::as_str) {
        Some("Camera") => decode_camera(item).map(|c| Some(MapFeature::Camera(c))),
        Some("Cluster") => decode_cluster(item).map(|c| Some(MapFeature::Cluster(c))),
        _ => Ok(None),
    }
}

fn decode_camera(item: &Value) -> Result<CameraPartial, String> {
    let id = item
        .get("uri")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| "camera without uri".to_string())?;

    let location = item
        .get("features")
        .and_then(Value::as_array)
        .and_then(|features| first_point(features));

    Ok(CameraPartial {
        id: id.to_string(),
        title: item.get("title").and_then(Value::as_str).map(str::to_string),
        active: item.get("active").and_then(Value::as_bool),
        location,
    })
}

fn decode_cluster(item: &Value) -> Result<ClusterNode, String> {
    let bbox = item.get("bbox");
    let values = bbox
        .and_then(bbox_values)
        .ok_or_else(|| format!("cluster without 4-element bbox: {bbox:?}"))?;
    let region = Region::from_bbox_array(&values)
        .map_err(|e| format!("cluster with unusable bbox: {e}"))?;

    let suggested_zoom = item
        .get("maxZoom")
        .and_then(Value::as_u64)
        .and_then(|z| u32::try_from(z).ok())
        .map(ZoomLevel::new);

    Ok(ClusterNode {
        region,
        suggested_zoom,
    })
}

fn bbox_values(bbox: &Value) -> Option<Vec<f64>> {
    let items = bbox.as_array().filter(|a| a.len() == 4)?;
    items.iter().map(Value::as_f64).collect()
}

/// Location of the first `Point` sub-feature with at least two numeric coordinates.
fn first_point(features: &[Value]) -> Option<GeoPoint> {
    features.iter().find_map(|f| {
        let geometry = f.get("geometry")?;
        if geometry.get("type").and_then(Value::as_str) != Some("Point") {
            return None;
        }
        match geometry.get("coordinates")?.as_array()?.as_slice() {
            [lon, lat, ..] => Some(GeoPoint {
                lon: lon.as_f64()?,
                lat: lat.as_f64()?,
            }),
            _ => None,
        }
    })
}
