//! Application state shared across handlers.

use crate::worker::JobQueue;
use std::sync::Arc;
use templar_core::config::AppConfig;
use templar_metadata::MetadataStore;
use templar_storage::ObjectStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Tiered object store (cache + primary, per-key locked).
    pub store: Arc<dyn ObjectStore>,
    /// Metadata catalog.
    pub metadata: Arc<dyn MetadataStore>,
    /// Background push job queue.
    pub jobs: JobQueue,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; `main` validates before
    /// constructing state, so this only fires on programmer error.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        jobs: JobQueue,
    ) -> Self {
        if let Err(error) = config.validate() {
            panic!("invalid configuration: {error}");
        }
        Self {
            config: Arc::new(config),
            store,
            metadata,
            jobs,
        }
    }
}
