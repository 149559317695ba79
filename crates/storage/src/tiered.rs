//! Two-tier streaming object store client.
//!
//! `TieredStore` wraps a fast, size-bounded cache backend and a durable
//! primary backend. Uploads stream to both tiers in a single pass over the
//! source bytes; downloads are served from cache when possible and
//! re-populate it from primary on miss while still streaming to the caller.
//! The cache tier is best-effort throughout: its failures are logged and
//! never fail the user operation, and the LRU tracker is only updated for
//! bytes the cache actually accepted.

use crate::error::{StorageError, StorageResult};
use crate::lru::LruPolicy;
use crate::pipe::{DEFAULT_PIPE_CAPACITY, PipeReader, PipeWriter, pipe};
use crate::traits::{ObjectReader, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::warn;

/// Chunk size for pumping bytes between tiers (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Tiered object store client.
pub struct TieredStore<C, P> {
    cache: Arc<C>,
    primary: Arc<P>,
    policy: Arc<LruPolicy>,
}

impl<C: ObjectStore, P: ObjectStore> TieredStore<C, P> {
    /// Create a tiered store over a cache backend and a primary backend.
    pub fn new(cache: C, primary: P, policy: LruPolicy) -> Self {
        Self {
            cache: Arc::new(cache),
            primary: Arc::new(primary),
            policy: Arc::new(policy),
        }
    }

    /// Eviction state, exposed for assertions in tests.
    pub fn policy(&self) -> &LruPolicy {
        &self.policy
    }

    /// Write one leg of a tee into the cache backend.
    ///
    /// On success the observed byte count is recorded in the LRU and any
    /// victims it reports are deleted from the cache, best effort. On
    /// failure the entry is not tracked; the pump notices the dropped
    /// reader and stops feeding this leg, so the primary side never stalls.
    async fn cache_fill(cache: Arc<C>, policy: Arc<LruPolicy>, key: String, reader: PipeReader) {
        match cache.upload(&key, Box::pin(reader)).await {
            Ok(bytes) => {
                for victim in policy.on_add(&key, bytes as i64) {
                    if let Err(e) = cache.delete(&victim).await {
                        warn!(key = %victim, error = %e, "failed to evict from cache");
                    }
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "failed to cache");
            }
        }
    }

    /// Read the source once, fanning each chunk out to the primary leg and
    /// the cache leg. The cache leg is optional from the start and is
    /// abandoned the moment it stops accepting bytes.
    async fn pump(
        mut source: ObjectReader,
        primary_tx: PipeWriter,
        cache_tx: PipeWriter,
    ) {
        let mut cache_tx = Some(cache_tx);
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];

        loop {
            let n = match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    // Source failed: poison both legs so neither tier
                    // commits a truncated object.
                    if let Some(tx) = cache_tx.take() {
                        tx.close_with_error(io::Error::new(e.kind(), e.to_string()))
                            .await;
                    }
                    primary_tx.close_with_error(e).await;
                    return;
                }
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);

            if primary_tx.write(chunk.clone()).await.is_err() {
                // Primary upload returned early (failure): stop reading and
                // poison the cache leg so it aborts instead of committing a
                // prefix of the object.
                if let Some(tx) = cache_tx.take() {
                    tx.close_with_error(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "primary upload aborted",
                    ))
                    .await;
                }
                return;
            }

            if let Some(tx) = &cache_tx {
                if tx.write(chunk).await.is_err() {
                    cache_tx = None;
                }
            }
        }
        // Falling out of the loop drops both writers: clean EOF on each leg.
    }

    /// Relay a primary reader to the caller and the cache backfill at once.
    ///
    /// When the caller drops its reader mid-stream, the relay stops and the
    /// cache leg is closed cleanly, so the backfill commits the bytes
    /// received so far and the LRU records that observed size. A primary
    /// read error instead poisons both legs.
    async fn relay(mut primary: ObjectReader, client_tx: PipeWriter, cache_tx: PipeWriter) {
        let mut cache_tx = Some(cache_tx);
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];

        loop {
            let n = match primary.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    if let Some(tx) = cache_tx.take() {
                        tx.close_with_error(io::Error::new(e.kind(), e.to_string()))
                            .await;
                    }
                    client_tx.close_with_error(e).await;
                    return;
                }
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);

            if client_tx.write(chunk.clone()).await.is_err() {
                // Caller abandoned the download: commit the partial prefix.
                return;
            }

            if let Some(tx) = &cache_tx {
                if tx.write(chunk).await.is_err() {
                    cache_tx = None;
                }
            }
        }
    }
}

#[async_trait]
impl<C: ObjectStore, P: ObjectStore> ObjectStore for TieredStore<C, P> {
    async fn upload(&self, key: &str, reader: ObjectReader) -> StorageResult<u64> {
        let (primary_tx, primary_rx) = pipe(DEFAULT_PIPE_CAPACITY);
        let (cache_tx, cache_rx) = pipe(DEFAULT_PIPE_CAPACITY);

        let cache_task = tokio::spawn(Self::cache_fill(
            self.cache.clone(),
            self.policy.clone(),
            key.to_string(),
            cache_rx,
        ));

        let primary_fut = self.primary.upload(key, Box::pin(primary_rx));
        let pump_fut = Self::pump(reader, primary_tx, cache_tx);

        let (primary_res, ()) = tokio::join!(primary_fut, pump_fut);

        if cache_task.await.is_err() {
            warn!(key = %key, "cache writer task failed");
        }

        primary_res
    }

    async fn download(&self, key: &str) -> StorageResult<ObjectReader> {
        match self.cache.download(key).await {
            Ok(reader) => {
                self.policy.on_access(key);
                Ok(reader)
            }
            Err(cache_err) => {
                if !cache_err.is_not_found() {
                    warn!(key = %key, error = %cache_err, "cache read failed, falling back to primary");
                }

                let primary = self
                    .primary
                    .download(key)
                    .await
                    .map_err(|e| StorageError::Primary(Box::new(e)))?;

                let (client_tx, client_rx) = pipe(DEFAULT_PIPE_CAPACITY);
                let (cache_tx, cache_rx) = pipe(DEFAULT_PIPE_CAPACITY);

                tokio::spawn(Self::cache_fill(
                    self.cache.clone(),
                    self.policy.clone(),
                    key.to_string(),
                    cache_rx,
                ));
                tokio::spawn(Self::relay(primary, client_tx, cache_tx));

                Ok(Box::pin(client_rx))
            }
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self.cache.delete(key).await {
            Ok(()) => self.policy.on_remove(key),
            Err(e) => warn!(key = %key, error = %e, "failed to delete from cache"),
        }
        self.primary.delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        "tiered"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.cache.health_check().await?;
        self.primary.health_check().await
    }
}
