//! GraphQL request envelopes and response classification.
//!
//! The upstream API reports transient overload as a GraphQL error whose
//! message contains [`TRANSIENT_MARKER`], frequently with HTTP 200. All
//! knowledge of that marker lives in this module; the retry loop only sees
//! [`AppError::is_retryable`].

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::traits::TransportResponse;

/// Substring identifying a retryable upstream fault.
pub const TRANSIENT_MARKER: &str = "Server error";

/// A single `{query, variables}` GraphQL request.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
}

impl GraphQlRequest {
    pub fn new(query: impl Into<String>, variables: Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// Request body: one query object or a batch envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GraphQlPayload {
    Single(GraphQlRequest),
    Batch(Vec<GraphQlRequest>),
}

/// Whether an error message carries the transient marker.
pub fn is_transient_marker(message: &str) -> bool {
    message.contains(TRANSIENT_MARKER)
}

/// Message of the first entry of a non-empty `errors` array.
///
/// Returns `Some("")` when the first entry has no string message.
pub fn first_error_message(response: &Value) -> Option<&str> {
    let first = response.get("errors")?.as_array()?.first()?;
    Some(first.get("message").and_then(Value::as_str).unwrap_or(""))
}

fn has_transient_error(response: &Value) -> bool {
    first_error_message(response).is_some_and(is_transient_marker)
}

/// Turn a raw HTTP exchange into parsed JSON or a classified error.
///
/// - non-2xx with the marker in the body: [`AppError::TransientServerFault`]
/// - non-2xx otherwise: [`AppError::HttpStatus`] (fatal)
/// - unparseable body: [`AppError::MalformedResponse`]
/// - any object (or batch element) whose first GraphQL error has the marker:
///   [`AppError::TransientServerFault`]
pub fn classify_response(response: TransportResponse) -> Result<Value, AppError> {
    if !response.is_success() {
        if is_transient_marker(&response.body) {
            return Err(AppError::TransientServerFault(format!(
                "HTTP {}: {}",
                response.status, response.body
            )));
        }
        return Err(AppError::HttpStatus {
            status: response.status,
            body: response.body,
        });
    }

    let data: Value = serde_json::from_str(&response.body)
        .map_err(|e| AppError::MalformedResponse(e.to_string()))?;

    let transient = match &data {
        Value::Array(items) => items.iter().any(has_transient_error),
        other => has_transient_error(other),
    };
    if transient {
        return Err(AppError::TransientServerFault("Server error.".to_string()));
    }

    Ok(data)
}

/// Fail with [`AppError::GraphQlError`] if the response carries a top-level `errors` array.
pub fn ensure_no_errors(response: &Value) -> Result<(), AppError> {
    match response.get("errors") {
        Some(Value::Array(errors)) if !errors.is_empty() => {
            Err(AppError::GraphQlError(Value::Array(errors.clone()).to_string()))
        }
        _ => Ok(()),
    }
}

/// Fail with [`AppError::GraphQlError`] if a query result carries a non-null `error` object.
pub fn ensure_no_query_error(result: &Value) -> Result<(), AppError> {
    match result.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(err) => Err(AppError::GraphQlError(err.to_string())),
    }
}

/// Fetch `data.<field>` from a response, failing with a protocol error if absent.
pub fn query_result<'a>(response: &'a Value, field: &str) -> Result<&'a Value, AppError> {
    response
        .get("data")
        .and_then(|d| d.get(field))
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::ProtocolError(format!("response has no data.{field}")))
}
