//! Template version repository trait.

use crate::error::MetadataResult;
use crate::models::TemplateVersionRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for immutable template versions.
#[async_trait]
pub trait VersionRepo: Send + Sync {
    /// Insert a version. Fails with `Constraint` when
    /// `(template_id, version_number)` already exists.
    async fn create_version(&self, version: &TemplateVersionRow) -> MetadataResult<()>;

    /// Get a version by template and version number.
    async fn get_version(
        &self,
        template_id: Uuid,
        version_number: i64,
    ) -> MetadataResult<Option<TemplateVersionRow>>;

    /// List all versions of a template, newest first.
    async fn list_versions(&self, template_id: Uuid) -> MetadataResult<Vec<TemplateVersionRow>>;
}
