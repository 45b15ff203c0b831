use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// MIME type of HTTP Live Streaming sources.
pub const HLS_MIME_TYPE: &str = "application/x-mpegURL";

/// Rectangular query area in degrees.
///
/// Always satisfies `west < east` and `south < north`; construction through
/// [`Region::new`] is the only way to obtain one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Bbox", into = "Bbox")]
pub struct Region {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

/// Unvalidated wire form of a [`Region`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bbox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Region {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, AppError> {
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite {
            return Err(AppError::ConfigError(format!(
                "Region has non-finite bounds: [{west}, {south}, {east}, {north}]"
            )));
        }
        if west >= east || south >= north {
            return Err(AppError::ConfigError(format!(
                "Region must satisfy west < east and south < north: [{west}, {south}, {east}, {north}]"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// For compile-time constants known to satisfy the invariant.
    pub(crate) const fn new_unchecked(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Build a region from an upstream `[west, south, east, north]` array.
    pub fn from_bbox_array(values: &[f64]) -> Result<Self, AppError> {
        match values {
            [w, s, e, n] => Self::new(*w, *s, *e, *n),
            _ => Err(AppError::ProtocolError(format!(
                "bbox must have 4 elements, got {}",
                values.len()
            ))),
        }
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn north(&self) -> f64 {
        self.north
    }
}

impl TryFrom<Bbox> for Region {
    type Error = AppError;

    fn try_from(b: Bbox) -> Result<Self, Self::Error> {
        Region::new(b.west, b.south, b.east, b.north)
    }
}

impl From<Region> for Bbox {
    fn from(r: Region) -> Self {
        Bbox {
            west: r.west,
            south: r.south,
            east: r.east,
            north: r.north,
        }
    }
}

/// Clustering granularity of the map-features service. Higher is finer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoomLevel(u32);

impl ZoomLevel {
    pub const fn new(level: u32) -> Self {
        Self(level)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dedup key of an [`ExpansionJob`]: coordinates rounded to 6 decimals plus zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    west: i64,
    south: i64,
    east: i64,
    north: i64,
    zoom: ZoomLevel,
}

fn micro_degrees(v: f64) -> i64 {
    (v * 1_000_000.0).round() as i64
}

/// One unit of crawl work: query `region` at `zoom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpansionJob {
    pub region: Region,
    pub zoom: ZoomLevel,
}

impl ExpansionJob {
    pub fn new(region: Region, zoom: ZoomLevel) -> Self {
        Self { region, zoom }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            west: micro_degrees(self.region.west),
            south: micro_degrees(self.region.south),
            east: micro_degrees(self.region.east),
            north: micro_degrees(self.region.north),
            zoom: self.zoom,
        }
    }
}

/// WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Camera attributes known from spatial discovery, before media sources are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPartial {
    pub id: String,
    pub title: Option<String>,
    pub active: Option<bool>,
    pub location: Option<GeoPoint>,
}

/// Aggregated group of cameras too dense to enumerate at the queried zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    pub region: Region,
    pub suggested_zoom: Option<ZoomLevel>,
}

/// A single result of a map-features query.
#[derive(Debug, Clone, PartialEq)]
pub enum MapFeature {
    Camera(CameraPartial),
    Cluster(ClusterNode),
}

/// A playable media source of a camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    #[serde(rename = "type")]
    pub media_type: String,
    pub src: String,
}

impl MediaSource {
    pub fn hls(src: impl Into<String>) -> Self {
        Self {
            media_type: HLS_MIME_TYPE.to_string(),
            src: src.into(),
        }
    }
}

/// Camera id -> unique HLS sources, as produced by the view harvester.
pub type SourceMap = BTreeMap<String, Vec<MediaSource>>;

/// Camera id -> spatially discovered attributes.
pub type CameraMap = BTreeMap<String, CameraPartial>;

/// A merged camera: discovery attributes plus its media sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub id: String,
    pub title: Option<String>,
    pub active: Option<bool>,
    pub location: Option<GeoPoint>,
    pub sources: Vec<MediaSource>,
}

impl CameraRecord {
    /// True when the record can be placed on a map with a playable feed.
    pub fn is_placeable(&self) -> bool {
        self.location.is_some() && !self.sources.is_empty()
    }
}

/// The merged, ordered output of one harvest run.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDataset {
    pub generated_at: DateTime<Utc>,
    pub region: Region,
    pub cameras: Vec<CameraRecord>,
}

impl CameraDataset {
    pub fn count(&self) -> usize {
        self.cameras.len()
    }

    pub fn with_sources_count(&self) -> usize {
        self.cameras.iter().filter(|c| !c.sources.is_empty()).count()
    }

    pub fn placeable_count(&self) -> usize {
        self.cameras.iter().filter(|c| c.is_placeable()).count()
    }
}

/// An upstream GraphQL endpoint and the fixed headers it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }
}
