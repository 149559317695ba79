//! Job repository trait.

use crate::error::MetadataResult;
use crate::models::{JobRow, JobUpdate};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for background job records.
#[async_trait]
pub trait JobRepo: Send + Sync {
    /// Insert a job and return its assigned id.
    #[allow(clippy::too_many_arguments)]
    async fn create_job(
        &self,
        job_type: &str,
        template_id: Uuid,
        version_number: Option<i64>,
        status: &str,
        progress: i64,
        started_at: OffsetDateTime,
        metadata: &str,
    ) -> MetadataResult<i64>;

    /// Apply a partial update to a job row.
    async fn update_job(&self, id: i64, update: &JobUpdate) -> MetadataResult<()>;

    /// Get a job by id.
    async fn get_job(&self, id: i64) -> MetadataResult<Option<JobRow>>;

    /// List jobs, newest first.
    async fn list_jobs(&self, limit: i64, offset: i64) -> MetadataResult<Vec<JobRow>>;
}
