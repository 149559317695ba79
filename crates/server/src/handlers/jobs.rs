//! Job listing handler.

use crate::error::{ApiError, ApiResult, Envelope};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use templar_metadata::{JobRepo, JobRow};

/// Default page size when the client does not provide one.
const DEFAULT_LIMIT: i64 = 10;
/// Upper bound on page size.
const MAX_LIMIT: i64 = 100;

/// Offset/limit pagination parameters.
///
/// `cursor` is accepted as an opaque continuation marker; a request carrying
/// one starts from the head of the listing, matching page-one semantics.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

impl PaginationParams {
    pub fn limit(&self) -> ApiResult<i64> {
        match self.limit {
            None => Ok(DEFAULT_LIMIT),
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => Err(ApiError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {limit}"
            ))),
        }
    }

    pub fn offset(&self, limit: i64) -> ApiResult<i64> {
        if self.cursor.is_some() {
            return Ok(0);
        }
        match self.page {
            None => Ok(0),
            Some(page) if page >= 1 => Ok((page - 1) * limit),
            Some(page) => Err(ApiError::Validation(format!(
                "page must be at least 1, got {page}"
            ))),
        }
    }
}

/// `GET /api/v1/jobs?page=&limit=&cursor=`
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<Json<Envelope<Vec<JobRow>>>> {
    let limit = params.limit()?;
    let offset = params.offset(limit)?;
    let jobs = state.metadata.list_jobs(limit, offset).await?;
    Ok(Envelope::data(jobs))
}
