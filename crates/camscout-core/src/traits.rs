use std::future::Future;

use crate::error::AppError;
use crate::models::{CameraDataset, Endpoint};

/// Raw outcome of one HTTP exchange. Status interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// POSTs a JSON payload to an endpoint.
///
/// Implementations map connection failures to [`AppError::NetworkError`] and
/// timeouts to [`AppError::Timeout`]; any received response, whatever its
/// status, is returned as `Ok`.
pub trait Transport: Send + Sync + Clone {
    fn post_json(
        &self,
        endpoint: &Endpoint,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<TransportResponse, AppError>> + Send;
}

/// Persists a merged camera dataset.
pub trait DatasetSink: Send + Sync {
    fn write(&self, dataset: &CameraDataset) -> Result<(), AppError>;
}
