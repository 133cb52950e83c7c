//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use workflow::WorkflowError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error from the cart runtime.
    Workflow(WorkflowError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Workflow(err) => workflow_error_to_response(err),
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string()).increment(1);
        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn workflow_error_to_response(err: WorkflowError) -> (StatusCode, String) {
    let status = match &err {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::ProcessClosed(_) | WorkflowError::AlreadyStarted(_) => StatusCode::CONFLICT,
        WorkflowError::InvalidSignal(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Stopped(_)
        | WorkflowError::Cart(_)
        | WorkflowError::Journal(_)
        | WorkflowError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
