//! API error types and response envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// Body of an error in the response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Response envelope shared by every endpoint: `{data?, error}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> Envelope<T> {
    /// Successful response carrying data.
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            data: Some(data),
            error: None,
        })
    }
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template {template_id} version {version} not found")]
    VersionNotFound { template_id: Uuid, version: i64 },

    #[error("Template {template_id} version {version} already exists")]
    VersionAlreadyExists { template_id: Uuid, version: i64 },

    #[error("Failed to get object from object store: {0}")]
    ObjectStoreGet(#[source] templar_storage::StorageError),

    #[error("storage error: {0}")]
    Storage(#[from] templar_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] templar_metadata::MetadataError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::VersionNotFound { .. } => "template_version.not_found",
            Self::VersionAlreadyExists { .. } => "template_version.already_exists",
            Self::ObjectStoreGet(_) => "object_store.get",
            Self::Storage(_) | Self::Metadata(_) | Self::Internal(_) => "internal",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::VersionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::VersionAlreadyExists { .. } => StatusCode::CONFLICT,
            Self::ObjectStoreGet(_) | Self::Storage(_) | Self::Metadata(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Client errors are expected traffic; only infrastructure failures
        // are worth an error-level event.
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = Envelope::<()> {
            data: None,
            error: Some(ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
