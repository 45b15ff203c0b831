//! Join of spatially discovered cameras with harvested media sources.

use std::cmp::Ordering;

use crate::models::{CameraMap, CameraRecord, SourceMap};

/// One record per discovered camera, with its HLS sources attached.
///
/// Cameras that only appear in `sources` are dropped: without a discovery
/// hit there is no location to place them at. Output is ordered by
/// [`compare_camera_ids`].
pub fn merge(cameras: &CameraMap, sources: &SourceMap) -> Vec<CameraRecord> {
    let mut records: Vec<CameraRecord> = cameras
        .values()
        .map(|camera| CameraRecord {
            id: camera.id.clone(),
            title: camera.title.clone(),
            active: camera.active,
            location: camera.location,
            sources: sources.get(&camera.id).cloned().unwrap_or_default(),
        })
        .collect();

    records.sort_by(|a, b| compare_camera_ids(&a.id, &b.id));
    records
}

/// Numeric id of a camera uri such as `camera/123`, taken from the second
/// `/`-separated segment.
pub fn numeric_id(id: &str) -> Option<i64> {
    id.split('/').nth(1)?.parse().ok()
}

/// Ids with a numeric segment come first in ascending numeric order,
/// everything else after them. Ties fall back to the full id.
pub fn compare_camera_ids(a: &str, b: &str) -> Ordering {
    let rank = |id: &str| match numeric_id(id) {
        Some(n) => (0, n),
        None => (1, 0),
    };
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}
