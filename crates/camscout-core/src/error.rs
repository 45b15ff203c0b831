use thiserror::Error;

/// Application-wide error types for camscout.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Response body could not be parsed as JSON.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Upstream reported a transient server fault (possibly inside an HTTP 200).
    #[error("Transient server fault: {0}")]
    TransientServerFault(String),

    /// Non-2xx response without the transient marker.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Well-formed response carrying an application-level error object.
    #[error("GraphQL error: {0}")]
    GraphQlError(String),

    /// Response did not have the expected shape.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Every attempt failed with a transient fault.
    #[error("Exceeded {attempts} attempts. Last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<AppError> },

    /// The run was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Writing or reading a dataset failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::MalformedResponse(_)
                | AppError::TransientServerFault(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError(e.to_string())
    }
}
