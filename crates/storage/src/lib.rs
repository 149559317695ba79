//! Tiered streaming object storage for Templar.
//!
//! This crate provides:
//! - The `ObjectStore` contract shared by every tier
//! - Backends: local filesystem (cache tier) and Storj gateway (primary tier)
//! - A tee-pipe tiered client that streams uploads to both tiers at once
//!   and backfills the cache on download miss
//! - Per-key reader/writer exclusion via the `SyncStore` decorator
//! - Byte-budgeted LRU eviction tracking

pub mod backends;
pub mod error;
pub mod io;
pub mod lru;
pub mod pipe;
pub mod sync;
pub mod tiered;
pub mod traits;

pub use backends::{local::LocalBackend, storj::StorjBackend};
pub use error::{StorageError, StorageResult};
pub use io::{Digest, HashingReader, ProgressCounter, ProgressReader};
pub use lru::LruPolicy;
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use sync::{KeyLocks, SyncStore};
pub use tiered::TieredStore;
pub use traits::{ObjectReader, ObjectStore};

use std::sync::Arc;
use templar_core::config::ObjectStoreConfig;

/// Build the full storage stack from configuration:
/// local cache + remote primary, tiered with LRU eviction, wrapped with
/// per-key locking.
pub async fn from_config(config: &ObjectStoreConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    let cache = LocalBackend::new(&config.local.root).await?;
    let primary = StorjBackend::new(&config.storj).await?;
    let policy = LruPolicy::new(config.cache.max_size_bytes());

    let tiered = TieredStore::new(cache, primary, policy);
    Ok(Arc::new(SyncStore::new(tiered)))
}
