//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A boxed async reader over an object's bytes, positioned at byte 0.
///
/// Dropping the reader releases whatever the backend holds open for it
/// (file handles, network streams, read locks).
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Object store abstraction implemented by every tier.
///
/// Backends stream; they never buffer a whole object in memory. Uploads are
/// atomic from the caller's perspective: a crash mid-write leaves either the
/// prior object or nothing, never a truncated blob.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Consume the reader to EOF and durably store its bytes under `key`,
    /// overwriting any previous object. Returns the number of bytes written.
    async fn upload(&self, key: &str, reader: ObjectReader) -> StorageResult<u64>;

    /// Open a reader over the object stored under `key`.
    ///
    /// Fails with `StorageError::NotFound` if the key is absent.
    async fn download(&self, key: &str) -> StorageResult<ObjectReader>;

    /// Remove `key`. Idempotent: deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Static identifier for the backend type, used in logging.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity.
    ///
    /// Called during server startup so the process fails fast when a tier is
    /// unreachable. The default implementation succeeds.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
