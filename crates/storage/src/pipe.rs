//! In-process byte pipe with error propagation.
//!
//! The tiered client couples a producer and a consumer through this pipe:
//! the writer pushes `Bytes` chunks, the reader consumes them as an
//! `AsyncRead`. Closing the writer with an error surfaces that error to the
//! reader mid-stream; dropping the reader makes subsequent writes fail with
//! `BrokenPipe`. The channel is bounded, so a stalled reader backpressures
//! the writer instead of buffering the object.

use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;

/// Default pipe depth in chunks.
pub const DEFAULT_PIPE_CAPACITY: usize = 8;

/// Create a bounded byte pipe.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(capacity);
    let reader = PipeReader {
        inner: StreamReader::new(ReceiverStream::new(rx)),
    };
    (PipeWriter { tx }, reader)
}

/// Writing half of a byte pipe.
///
/// Dropping the writer closes the pipe cleanly: the reader observes EOF
/// after draining buffered chunks.
pub struct PipeWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl PipeWriter {
    /// Send a chunk, waiting for channel capacity.
    ///
    /// Fails with `BrokenPipe` once the reader has been dropped.
    pub async fn write(&self, chunk: Bytes) -> io::Result<()> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))
    }

    /// Close the pipe with an error.
    ///
    /// The reader observes the error after draining buffered chunks. If the
    /// reader is already gone there is nobody left to inform, so the error is
    /// discarded.
    pub async fn close_with_error(self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }
}

/// Reading half of a byte pipe.
pub struct PipeReader {
    inner: StreamReader<ReceiverStream<io::Result<Bytes>>, Bytes>,
}

impl AsyncRead for PipeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn chunks_arrive_in_order_then_eof() {
        let (pw, mut pr) = pipe(4);

        let writer = tokio::spawn(async move {
            pw.write(Bytes::from_static(b"hello ")).await.unwrap();
            pw.write(Bytes::from_static(b"world")).await.unwrap();
            // drop closes cleanly
        });

        let mut out = Vec::new();
        pr.read_to_end(&mut out).await.unwrap();
        writer.await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn close_with_error_surfaces_to_reader() {
        let (pw, mut pr) = pipe(4);

        pw.write(Bytes::from_static(b"partial")).await.unwrap();
        pw.close_with_error(io::Error::other("primary upload failed"))
            .await;

        let mut out = Vec::new();
        let err = pr.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.to_string(), "primary upload failed");
        // Bytes before the error are still delivered.
        assert_eq!(out, b"partial");
    }

    #[tokio::test]
    async fn write_after_reader_drop_is_broken_pipe() {
        let (pw, pr) = pipe(1);
        drop(pr);

        let err = pw.write(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn bounded_pipe_backpressures_writer() {
        let (pw, mut pr) = pipe(1);

        pw.write(Bytes::from_static(b"a")).await.unwrap();
        // Second write must wait until the reader drains a chunk.
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            pw.write(Bytes::from_static(b"b")),
        )
        .await;
        assert!(pending.is_err(), "write should block on a full pipe");

        let mut buf = [0u8; 1];
        pr.read_exact(&mut buf).await.unwrap();
        pw.write(Bytes::from_static(b"b")).await.unwrap();
    }
}
