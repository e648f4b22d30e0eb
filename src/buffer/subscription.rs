//! Per-reader subscription
//!
//! A `ByteSubscription` is the receiving end of one reader's delivery
//! channel. It holds only a weak reference back to its buffer, so readers
//! never keep a buffer alive, and it deregisters itself when dropped.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use futures_core::Stream;
use tokio::sync::mpsc;

use super::store::Shared;

/// Single-pass, in-order view of a broadcast buffer
///
/// Yields the buffer's history, then live appends, and ends when the buffer
/// is closed (or this subscription is unsubscribed). Bytes can be consumed
/// one at a time with [`next`](Self::next) or as chunks with
/// [`next_chunk`](Self::next_chunk); both draw from the same position.
pub struct ByteSubscription {
    /// Subscription ID within the owning buffer
    id: u64,

    /// Delivery channel; closed by the buffer on close or unsubscribe
    rx: mpsc::UnboundedReceiver<Bytes>,

    /// Unread remainder of the last received chunk
    current: Bytes,

    /// Owning buffer
    owner: Weak<Shared>,
}

impl ByteSubscription {
    pub(super) fn new(id: u64, rx: mpsc::UnboundedReceiver<Bytes>, owner: Weak<Shared>) -> Self {
        Self {
            id,
            rx,
            current: Bytes::new(),
            owner,
        }
    }

    /// A subscription that is already at end-of-stream
    pub fn empty() -> Self {
        let (_, rx) = mpsc::unbounded_channel();
        Self::new(0, rx, Weak::new())
    }

    /// Subscription ID within the owning buffer
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn owner(&self) -> &Weak<Shared> {
        &self.owner
    }

    /// Receive the next byte, or `None` at end-of-stream
    pub async fn next(&mut self) -> Option<u8> {
        std::future::poll_fn(|cx| self.poll_byte(cx)).await
    }

    /// Receive the next run of bytes, or `None` at end-of-stream
    ///
    /// Chunk boundaries are not meaningful; only the byte order is.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        std::future::poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Stop receiving and deregister from the buffer
    pub fn cancel(self) {
        drop(self);
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        if !self.current.is_empty() {
            return Poll::Ready(Some(std::mem::take(&mut self.current)));
        }
        self.rx.poll_recv(cx)
    }

    fn poll_byte(&mut self, cx: &mut Context<'_>) -> Poll<Option<u8>> {
        while self.current.is_empty() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => self.current = chunk,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(Some(self.current.get_u8()))
    }
}

impl Stream for ByteSubscription {
    type Item = u8;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u8>> {
        self.get_mut().poll_byte(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.current.len(), None)
    }
}

impl Drop for ByteSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.owner.upgrade() {
            shared.detach(self.id);
        }
    }
}

impl std::fmt::Debug for ByteSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSubscription")
            .field("id", &self.id)
            .field("buffered", &self.current.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready_eq, task};

    use crate::buffer::BroadcastBuffer;

    use super::*;

    #[tokio::test]
    async fn test_empty_subscription_ends() {
        let mut sub = ByteSubscription::empty();
        assert_eq!(sub.next().await, None);
        assert_eq!(sub.next_chunk().await, None);
    }

    #[test]
    fn test_pending_until_append() {
        let buffer = BroadcastBuffer::new();
        let mut sub = buffer.subscribe();

        {
            let mut next = task::spawn(sub.next());
            assert_pending!(next.poll());

            buffer.append("q").unwrap();
            assert!(next.is_woken());
            assert_ready_eq!(next.poll(), Some(b'q'));
        }

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());
        buffer.close();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), None);
    }

    #[tokio::test]
    async fn test_single_byte_appends_arrive_in_order() {
        let buffer = BroadcastBuffer::new();
        let mut sub = buffer.subscribe();

        for byte in 0..=255u8 {
            buffer.append(vec![byte]).unwrap();
        }
        buffer.close();

        for expected in 0..=255u8 {
            assert_eq!(sub.next().await, Some(expected));
        }
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_bytes_and_chunks_share_position() {
        let buffer = BroadcastBuffer::new();
        let mut sub = buffer.subscribe();
        buffer.append("abc").unwrap();
        buffer.append("de").unwrap();
        buffer.close();

        assert_eq!(sub.next().await, Some(b'a'));
        assert_eq!(sub.next_chunk().await, Some(Bytes::from_static(b"bc")));
        assert_eq!(sub.next_chunk().await, Some(Bytes::from_static(b"de")));
        assert_eq!(sub.next_chunk().await, None);
    }

    #[tokio::test]
    async fn test_subscription_does_not_keep_buffer_alive() {
        let buffer = BroadcastBuffer::new();
        let sub = buffer.subscribe();
        drop(buffer);

        assert!(sub.owner().upgrade().is_none());
    }
}
