//! Async reader adapters used by the push pipeline.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use templar_core::ContentHash;
use tokio::io::{AsyncRead, ReadBuf};

/// Shared byte counter over a stream with a known total.
///
/// The reader side increments the counter; the progress reporter polls
/// `fraction()` from another task.
#[derive(Clone)]
pub struct ProgressCounter {
    read: Arc<AtomicU64>,
    total: u64,
}

impl ProgressCounter {
    /// Bytes observed so far.
    pub fn bytes_read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    /// Fraction of the total consumed, in [0.0, 1.0].
    ///
    /// A zero-byte stream is complete by definition.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.bytes_read() as f64 / self.total as f64).min(1.0)
    }

    /// Progress as an integer percentage in [0, 100].
    pub fn percent(&self) -> i64 {
        (self.fraction() * 100.0).floor() as i64
    }
}

/// Reader that counts bytes against a declared total.
pub struct ProgressReader<R> {
    inner: R,
    read: Arc<AtomicU64>,
}

impl<R> ProgressReader<R> {
    /// Wrap a reader, returning the reader and the counter handle.
    pub fn new(inner: R, total: u64) -> (Self, ProgressCounter) {
        let read = Arc::new(AtomicU64::new(0));
        let counter = ProgressCounter {
            read: read.clone(),
            total,
        };
        (Self { inner, read }, counter)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = buf.filled().len() - before;
                self.read.fetch_add(n as u64, Ordering::Relaxed);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Handle to a digest being computed by a [`HashingReader`].
///
/// `finalize()` may be called at any time; callers invoke it after the
/// wrapped reader has been consumed to EOF.
#[derive(Clone)]
pub struct Digest {
    hasher: Arc<Mutex<blake3::Hasher>>,
}

impl Digest {
    /// Hash of all bytes observed so far.
    pub fn finalize(&self) -> ContentHash {
        let hasher = self.hasher.lock().unwrap_or_else(|e| e.into_inner());
        ContentHash::from_bytes(*hasher.finalize().as_bytes())
    }
}

/// Reader that folds every byte it yields into a BLAKE3 hasher.
pub struct HashingReader<R> {
    inner: R,
    hasher: Arc<Mutex<blake3::Hasher>>,
}

impl<R> HashingReader<R> {
    /// Wrap a reader, returning the reader and the digest handle.
    pub fn new(inner: R) -> (Self, Digest) {
        let hasher = Arc::new(Mutex::new(blake3::Hasher::new()));
        let digest = Digest {
            hasher: hasher.clone(),
        };
        (Self { inner, hasher }, digest)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        match Pin::new(&mut self.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let new_bytes = &buf.filled()[before..];
                if !new_bytes.is_empty() {
                    let mut hasher = self.hasher.lock().unwrap_or_else(|e| e.into_inner());
                    hasher.update(new_bytes);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
