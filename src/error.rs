use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::device::DeviceError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not signed in")]
    Unauthorized,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no delivery assigned")]
    NoDeliveryAssigned,

    #[error("network error: {0}")]
    Network(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Api { status: 401 | 403, .. } => AppError::Unauthorized,
            other => AppError::Network(other.to_string()),
        }
    }
}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::PermissionDenied(capability) => AppError::PermissionDenied(format!(
                "{capability} access is required for this step"
            )),
            DeviceError::Unavailable(reason) => AppError::Conflict(reason),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "not signed in".to_string()),
            AppError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NoDeliveryAssigned => (
                StatusCode::NOT_FOUND,
                "no delivery assigned".to_string(),
            ),
            AppError::Network(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
