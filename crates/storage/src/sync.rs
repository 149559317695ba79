//! Per-key reader/writer exclusion for object stores.
//!
//! `SyncStore` decorates any backend so that concurrent operations on the
//! same key never interleave: uploads and deletes hold the key's write lock
//! for the whole operation, downloads hold a read lock for as long as the
//! returned reader is alive. Operations on distinct keys proceed in
//! parallel.

use crate::error::StorageResult;
use crate::traits::{ObjectReader, ObjectStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

/// Map of object keys to readers-writer locks.
///
/// Locks are created on first use and kept for the process lifetime. Growth
/// is bounded by the number of distinct keys in the workload, which is
/// acceptable for this domain.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl KeyLocks {
    /// Get the lock for a key, creating it on first use.
    pub fn get(&self, key: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Number of keys with a lock allocated. Test visibility only.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object store decorator serializing same-key operations.
pub struct SyncStore<S> {
    inner: S,
    locks: KeyLocks,
}

impl<S> SyncStore<S> {
    /// Wrap a backend with per-key locking.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locks: KeyLocks::default(),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for SyncStore<S> {
    async fn upload(&self, key: &str, reader: ObjectReader) -> StorageResult<u64> {
        let lock = self.locks.get(key);
        let _guard = lock.write_owned().await;
        self.inner.upload(key, reader).await
    }

    async fn download(&self, key: &str) -> StorageResult<ObjectReader> {
        let lock = self.locks.get(key);
        let guard = lock.read_owned().await;
        // On error the guard drops here; on success it rides along with the
        // reader and is released exactly once when the caller drops it.
        let inner = self.inner.download(key).await?;
        Ok(Box::pin(LockedReader {
            inner,
            _guard: guard,
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let lock = self.locks.get(key);
        let _guard = lock.write_owned().await;
        self.inner.delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

/// Reader holding a key's read lock until dropped.
struct LockedReader {
    inner: ObjectReader,
    _guard: OwnedRwLockReadGuard<()>,
}

impl AsyncRead for LockedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}
