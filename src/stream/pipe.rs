//! Byte streams over OS pipes and other async readers
//!
//! [`PipeBytes`] exposes any `AsyncRead` (a child's stdout, a Unix pipe
//! receiver, a file) as a single-pass byte stream, optionally forwarding
//! every chunk it reads to a writer such as a log file. [`pump`] copies a
//! reader into a [`BroadcastBuffer`] so that many readers can share it.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use futures_core::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::task::JoinHandle;

use crate::buffer::BroadcastBuffer;
use crate::buffer::config::DEFAULT_READ_BUFFER_SIZE;
use crate::error::Result;

/// Byte stream read from an `AsyncRead`
///
/// Ends when the reader reports a zero-length read. A read error also ends
/// the stream (after a warning). When forwarding, each chunk is fully
/// written to the forward target before any of its bytes are yielded; if
/// forwarding fails it is disabled and reading continues.
pub struct PipeBytes<R, W = tokio::io::Sink> {
    /// Source; `None` once it has reported EOF or an error
    reader: Option<R>,

    /// Forward target for every chunk read
    forward: Option<W>,

    /// Whether `forward` has been flushed after EOF
    flushed: bool,

    /// Read scratch space
    buf: Box<[u8]>,

    /// Unread remainder of the last chunk
    chunk: Bytes,

    /// Part of the last chunk not yet written to `forward`
    unforwarded: Bytes,
}

impl<R> PipeBytes<R> {
    /// Stream the bytes of `reader`
    pub fn new(reader: R) -> Self {
        Self::build(Some(reader), None)
    }
}

impl PipeBytes<tokio::io::Empty> {
    /// Stream with no reader, ending immediately
    pub fn empty() -> Self {
        Self::build(None, None)
    }
}

impl<R, W> PipeBytes<R, W> {
    /// Stream the bytes of `reader`, copying each chunk to `forward`
    pub fn forwarding_to(reader: R, forward: W) -> Self {
        Self::build(Some(reader), Some(forward))
    }

    fn build(reader: Option<R>, forward: Option<W>) -> Self {
        Self {
            reader,
            forward,
            flushed: false,
            buf: vec![0; DEFAULT_READ_BUFFER_SIZE].into_boxed_slice(),
            chunk: Bytes::new(),
            unforwarded: Bytes::new(),
        }
    }

    /// Set the size of each read
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.buf = vec![0; size.max(1)].into_boxed_slice();
        self
    }

    /// The forward target, unless forwarding was disabled by an error
    pub fn forward_target(&self) -> Option<&W> {
        self.forward.as_ref()
    }

    fn disable_forwarding(&mut self, err: &io::Error) {
        tracing::warn!(error = %err, "Forwarding pipe output failed, disabling");
        self.forward = None;
        self.unforwarded = Bytes::new();
    }
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> PipeBytes<R, W> {
    /// Receive the next byte, or `None` at end-of-stream
    pub async fn next(&mut self) -> Option<u8> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Write out the pending part of the last chunk
    fn poll_forward(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        while !self.unforwarded.is_empty() {
            let Some(forward) = self.forward.as_mut() else {
                self.unforwarded = Bytes::new();
                break;
            };
            match Pin::new(forward).poll_write(cx, &self.unforwarded) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(0)) => {
                    self.disable_forwarding(&io::ErrorKind::WriteZero.into());
                }
                Poll::Ready(Ok(n)) => self.unforwarded.advance(n),
                Poll::Ready(Err(e)) => self.disable_forwarding(&e),
            }
        }
        Poll::Ready(())
    }

    fn poll_flush_forward(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if self.flushed {
            return Poll::Ready(());
        }
        if let Some(forward) = self.forward.as_mut() {
            match Pin::new(forward).poll_flush(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(())) => {}
                Poll::Ready(Err(e)) => self.disable_forwarding(&e),
            }
        }
        self.flushed = true;
        Poll::Ready(())
    }
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Stream for PipeBytes<R, W> {
    type Item = u8;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u8>> {
        let this = self.get_mut();

        loop {
            if this.poll_forward(cx).is_pending() {
                return Poll::Pending;
            }

            if !this.chunk.is_empty() {
                return Poll::Ready(Some(this.chunk.get_u8()));
            }

            let Some(reader) = this.reader.as_mut() else {
                if this.poll_flush_forward(cx).is_pending() {
                    return Poll::Pending;
                }
                return Poll::Ready(None);
            };

            let mut read_buf = ReadBuf::new(&mut this.buf);
            match Pin::new(reader).poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    tracing::warn!(error = %e, "Pipe read failed, ending stream");
                    this.reader = None;
                }
                Poll::Ready(Ok(())) if read_buf.filled().is_empty() => {
                    tracing::trace!("Pipe reached end of stream");
                    this.reader = None;
                }
                Poll::Ready(Ok(())) => {
                    let chunk = Bytes::copy_from_slice(read_buf.filled());
                    if this.forward.is_some() {
                        this.unforwarded = chunk.clone();
                    }
                    this.chunk = chunk;
                }
            }
        }
    }
}

impl<R, W> std::fmt::Debug for PipeBytes<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeBytes")
            .field("open", &self.reader.is_some())
            .field("forwarding", &self.forward.is_some())
            .field("buffered", &self.chunk.len())
            .finish_non_exhaustive()
    }
}

/// Copy `reader` into `buffer` until EOF, then close the buffer
///
/// Returns the number of bytes copied. The buffer is closed on a read error
/// as well, so its subscribers never wait on a dead source.
///
/// # Errors
/// Returns an I/O error if reading fails, or a buffer error if `buffer` was
/// closed by someone else while copying.
pub async fn pump<R>(mut reader: R, buffer: &BroadcastBuffer) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; buffer.config().read_buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(
                    buffer = %buffer.config().name,
                    error = %e,
                    bytes = total,
                    "Pump read failed, closing buffer"
                );
                buffer.close();
                return Err(e.into());
            }
        };
        buffer.append_slice(&chunk[..n])?;
        total += n as u64;
    }

    buffer.close();
    tracing::debug!(buffer = %buffer.config().name, bytes = total, "Pump finished");
    Ok(total)
}

impl BroadcastBuffer {
    /// Spawn a task that pumps `reader` into this buffer
    ///
    /// See [`pump`].
    pub fn spawn_pump<R>(&self, reader: R) -> JoinHandle<Result<u64>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = self.clone();
        tokio::spawn(async move { pump(reader, &buffer).await })
    }
}
