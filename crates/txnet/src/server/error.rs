use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use txnet_core::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAddress { .. }
            | CoreError::UnsupportedBlockchain(_)
            | CoreError::InvalidDepth { .. } => Self::BadRequest(err.to_string()),
            CoreError::ChainService(ref source) => {
                tracing::warn!(status = ?source.status(), error = %err, "chain data source failed");
                Self::ServiceUnavailable(err.to_string())
            }
            CoreError::Store(_) | CoreError::Configuration(_) => {
                tracing::error!(error = %err, "internal failure while serving request");
                Self::Internal(err.to_string())
            }
        }
    }
}
