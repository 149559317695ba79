//! Template repository trait.

use crate::error::MetadataResult;
use crate::models::TemplateRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for template records.
#[async_trait]
pub trait TemplateRepo: Send + Sync {
    /// Create a new template.
    async fn create_template(&self, template: &TemplateRow) -> MetadataResult<()>;

    /// Get a template by ID.
    async fn get_template(&self, id: Uuid) -> MetadataResult<Option<TemplateRow>>;

    /// List templates, optionally filtered by a name substring, newest first.
    async fn list_templates(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> MetadataResult<Vec<TemplateRow>>;
}
