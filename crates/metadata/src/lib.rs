//! Metadata catalog for Templar.
//!
//! Owns the persistent records: templates, their immutable versions, and
//! background push jobs. The catalog is exposed as a narrow set of repo
//! traits so the rest of the system treats it as an opaque store.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{JOB_TYPE_TEMPLATE_PUSH, JobRow, JobUpdate, TemplateRow, TemplateVersionRow, job_status};
pub use repos::{JobRepo, TemplateRepo, VersionRepo};
pub use store::{MetadataStore, SqliteStore};
