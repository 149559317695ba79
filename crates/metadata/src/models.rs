//! Database models mapping to the metadata schema.

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Template record. Created implicitly on first push if absent.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Immutable template version record.
///
/// `file_size` and `file_hash` are set when the row is inserted, which only
/// happens after the associated upload has fully succeeded.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TemplateVersionRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub version_number: i64,
    pub object_key: String,
    pub file_size: Option<i64>,
    pub file_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Background job record.
///
/// Status moves pending -> uploading -> completed | error; progress is in
/// [0, 100] and never decreases within a job.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRow {
    pub id: i64,
    pub job_type: String,
    pub template_id: Uuid,
    pub version_number: Option<i64>,
    pub status: String,
    pub progress: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    /// Opaque JSON blob describing the request that created the job.
    pub metadata: String,
}

/// Job status values.
pub mod job_status {
    pub const PENDING: &str = "pending";
    pub const UPLOADING: &str = "uploading";
    pub const COMPLETED: &str = "completed";
    pub const ERROR: &str = "error";
}

/// Job type for template pushes.
pub const JOB_TYPE_TEMPLATE_PUSH: &str = "template.push";

/// Field updates applied to a job row. `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct JobUpdate {
    pub status: Option<String>,
    pub progress: Option<i64>,
    pub error_message: Option<String>,
    pub completed_at: Option<OffsetDateTime>,
}

impl JobUpdate {
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: i64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_completed_at(mut self, at: OffsetDateTime) -> Self {
        self.completed_at = Some(at);
        self
    }
}
