//! In-memory object store backend for behavior tests.

// Each integration test binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use templar_storage::error::{StorageError, StorageResult};
use templar_storage::traits::{ObjectReader, ObjectStore};
use tokio::io::AsyncReadExt;

/// Shared in-memory backend.
///
/// Clones share state, so a test can hand one clone to the store under test
/// and keep another for inspection. Supports failure injection and
/// artificial latency for concurrency tests.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
    drop_uploads: AtomicBool,
    fail_downloads: AtomicBool,
    upload_delay_ms: AtomicU64,
    active_ops: AtomicUsize,
    max_active_ops: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail after draining its input.
    pub fn fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent upload fail without consuming its input, as a
    /// backend that errors out mid-stream would.
    pub fn drop_uploads(&self, drop: bool) {
        self.inner.drop_uploads.store(drop, Ordering::SeqCst);
    }

    /// Make every subsequent download fail.
    pub fn fail_downloads(&self, fail: bool) {
        self.inner.fail_downloads.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside each upload, for overlap detection.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.inner
            .upload_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Highest number of uploads/deletes observed in flight at once.
    pub fn max_active_ops(&self) -> usize {
        self.inner.max_active_ops.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.inner.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.into());
    }

    pub fn len(&self) -> usize {
        self.inner.objects.lock().unwrap().len()
    }

    fn enter_op(&self) {
        let active = self.inner.active_ops.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_active_ops.fetch_max(active, Ordering::SeqCst);
    }

    fn exit_op(&self) {
        self.inner.active_ops.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(&self, key: &str, mut reader: ObjectReader) -> StorageResult<u64> {
        if self.inner.drop_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected early upload failure",
            )));
        }
        self.enter_op();
        let delay = self.inner.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut data = Vec::new();
        let read = reader.read_to_end(&mut data).await;
        self.exit_op();
        let _ = read?;

        if self.inner.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected upload failure",
            )));
        }

        let written = data.len() as u64;
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from(data));
        Ok(written)
    }

    async fn download(&self, key: &str) -> StorageResult<ObjectReader> {
        if self.inner.fail_downloads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected download failure",
            )));
        }
        let data = self
            .inner
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(data.to_vec())))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.enter_op();
        self.inner.objects.lock().unwrap().remove(key);
        self.exit_op();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Read an object reader to completion.
pub async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    out
}

/// Poll `check` until it returns true or the deadline passes.
pub async fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check() {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
