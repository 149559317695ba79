//! Template and version listing handlers.

use crate::error::{ApiError, ApiResult, Envelope};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use templar_metadata::{TemplateRepo, TemplateRow, TemplateVersionRow, VersionRepo};
use uuid::Uuid;

/// Default page size for template listings.
const TEMPLATE_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    pub search: Option<String>,
}

/// `GET /api/v1/templates?search=`
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<ListTemplatesQuery>,
) -> ApiResult<Json<Envelope<Vec<TemplateRow>>>> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let templates = state
        .metadata
        .list_templates(search, TEMPLATE_LIST_LIMIT, 0)
        .await?;
    Ok(Envelope::data(templates))
}

#[derive(Debug, Deserialize)]
pub struct ListVersionsQuery {
    pub template_id: String,
}

/// `GET /api/v1/versions?template_id=`
pub async fn list_versions(
    State(state): State<AppState>,
    Query(query): Query<ListVersionsQuery>,
) -> ApiResult<Json<Envelope<Vec<TemplateVersionRow>>>> {
    let template_id = Uuid::parse_str(query.template_id.trim()).map_err(|_| {
        ApiError::Validation(format!("invalid template_id: {}", query.template_id))
    })?;
    let versions = state.metadata.list_versions(template_id).await?;
    Ok(Envelope::data(versions))
}

/// `GET /api/v1/versions/{template_id}/{version}` — version metadata
/// including size and hash.
pub async fn get_version(
    State(state): State<AppState>,
    Path((template_id, version)): Path<(String, i64)>,
) -> ApiResult<Json<Envelope<TemplateVersionRow>>> {
    let template_id = Uuid::parse_str(template_id.trim())
        .map_err(|_| ApiError::Validation(format!("invalid template_id: {template_id}")))?;
    if version < 1 {
        return Err(ApiError::Validation(format!(
            "version must be at least 1, got {version}"
        )));
    }

    let row = state
        .metadata
        .get_version(template_id, version)
        .await?
        .ok_or(ApiError::VersionNotFound {
            template_id,
            version,
        })?;
    Ok(Envelope::data(row))
}
