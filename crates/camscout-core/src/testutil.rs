//! Test utilities: mock transport, mock sink and JSON fixture builders.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::error::AppError;
use crate::models::{CameraDataset, Endpoint};
use crate::traits::{DatasetSink, Transport, TransportResponse};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

type Handler = dyn Fn(&Endpoint, &Value) -> Result<TransportResponse, AppError> + Send + Sync;

/// A request observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub payload: Value,
}

/// Mock transport answering from a script or a routing closure.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    /// Answer every request through `handler`.
    pub fn with_handler<H>(handler: H) -> Self
    where
        H: Fn(&Endpoint, &Value) -> Result<TransportResponse, AppError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer requests in order. Once the script runs out every call
    /// fails with a fatal protocol error.
    pub fn with_responses(responses: Vec<Result<TransportResponse, AppError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::with_handler(move |_, _| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::ProtocolError("mock script exhausted".into())))
        })
    }

    /// Answer every request with the same response.
    pub fn always(response: TransportResponse) -> Self {
        Self::with_handler(move |_, _| Ok(response.clone()))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        payload: &Value,
    ) -> Result<TransportResponse, AppError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: endpoint.url.clone(),
            payload: payload.clone(),
        });
        (self.handler)(endpoint, payload)
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock sink that records every dataset written.
#[derive(Clone, Default)]
pub struct MockSink {
    pub written: Arc<Mutex<Vec<CameraDataset>>>,
}

impl DatasetSink for MockSink {
    fn write(&self, dataset: &CameraDataset) -> Result<(), AppError> {
        self.written.lock().unwrap().push(dataset.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn json_response(body: Value) -> TransportResponse {
    TransportResponse::new(200, body.to_string())
}

/// HTTP 200 carrying the upstream's transient GraphQL error.
pub fn server_error_response() -> TransportResponse {
    json_response(json!({"errors": [{"message": "Server error."}]}))
}

/// One camera-view row with the given parent camera and `(type, src)` sources.
pub fn camera_view(parent_uri: Option<&str>, sources: &[(&str, &str)]) -> Value {
    let sources: Vec<Value> = sources
        .iter()
        .map(|(t, s)| json!({"type": t, "src": s}))
        .collect();
    json!({
        "category": "camera",
        "sources": sources,
        "parentCollection": parent_uri.map(|uri| json!({"uri": uri, "title": uri})),
        "lastUpdated": {"timestamp": 0, "timezone": "America/Denver"},
    })
}

/// A views-listing response body.
pub fn views_page(views: Vec<Value>, total_records: u64) -> Value {
    json!({
        "data": {
            "listCameraViewsQuery": {
                "cameraViews": views,
                "totalRecords": total_records,
                "error": null,
            }
        }
    })
}

pub fn camera_feature(uri: &str, lon: f64, lat: f64) -> Value {
    json!({
        "__typename": "Camera",
        "uri": uri,
        "title": format!("Camera {uri}"),
        "bbox": [lon, lat, lon, lat],
        "active": true,
        "features": [
            {"id": uri, "type": "Feature", "geometry": {"type": "Point", "coordinates": [lon, lat]}}
        ],
    })
}

pub fn cluster_feature(uri: &str, bbox: [f64; 4], max_zoom: Option<u32>) -> Value {
    json!({
        "__typename": "Cluster",
        "uri": uri,
        "title": "cluster",
        "bbox": bbox,
        "maxZoom": max_zoom,
        "features": [],
    })
}

/// A batched map-features response body.
pub fn map_features(features: Vec<Value>) -> Value {
    json!([
        {"data": {"mapFeaturesQuery": {"mapFeatures": features, "error": null}}}
    ])
}

/// `(west, south, east, north, zoom)` of a recorded map-features request.
pub fn map_request_job(payload: &Value) -> (f64, f64, f64, f64, u64) {
    let input = &payload[0]["variables"]["input"];
    (
        input["west"].as_f64().unwrap(),
        input["south"].as_f64().unwrap(),
        input["east"].as_f64().unwrap(),
        input["north"].as_f64().unwrap(),
        input["zoom"].as_u64().unwrap(),
    )
}

/// `recordOffset` of a recorded views request.
pub fn views_request_offset(payload: &Value) -> u64 {
    payload["variables"]["input"]["recordOffset"].as_u64().unwrap()
}
