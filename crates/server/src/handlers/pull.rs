//! Pull pipeline: stream an artifact back to the caller.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::Response;
use serde::Deserialize;
use templar_core::object_key;
use templar_metadata::VersionRepo;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// `POST /api/v1/pull` request body.
#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub template_id: String,
    pub version: i64,
}

/// `POST /api/v1/pull` — stream the artifact for `(template_id, version)`.
///
/// The version row is checked first so an unknown version is a clean 404;
/// a storage failure after that is an `object_store.get` error. The body
/// streams straight from the tiered store, so a cache miss re-populates the
/// cache while the response is in flight.
pub async fn pull(
    State(state): State<AppState>,
    body: Result<axum::Json<PullRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let axum::Json(req) =
        body.map_err(|e| ApiError::Validation(format!("malformed request body: {e}")))?;

    let template_id = Uuid::parse_str(req.template_id.trim())
        .map_err(|_| ApiError::Validation(format!("invalid template_id: {}", req.template_id)))?;
    if req.version < 1 {
        return Err(ApiError::Validation(format!(
            "version must be at least 1, got {}",
            req.version
        )));
    }

    let version = state
        .metadata
        .get_version(template_id, req.version)
        .await?
        .ok_or(ApiError::VersionNotFound {
            template_id,
            version: req.version,
        })?;

    let key = object_key(template_id, req.version);
    let reader = state
        .store
        .download(&key)
        .await
        .map_err(ApiError::ObjectStoreGet)?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=template_{template_id}_{}", req.version),
        );
    if let Some(size) = version.file_size {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    builder
        .body(Body::from_stream(ReaderStream::new(reader)))
        .map_err(|e| ApiError::Internal(format!("build response: {e}")))
}
