//! Buffer state and statistics
//!
//! `BufferState` is the mutable core guarded by the buffer's lock: the
//! append-only history, the live subscriber senders and the closed flag.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

/// Sending half of a subscription's delivery channel
pub(super) type ChunkSender = mpsc::UnboundedSender<Bytes>;

/// Mutable state of a broadcast buffer
pub(super) struct BufferState {
    /// History chunks, in append order
    ///
    /// Chunks appended since the last subscribe are kept as-is; `compact`
    /// merges them into one shared chunk. The byte sequence never changes.
    history: Vec<Bytes>,

    /// Total length of `history` in bytes
    len: usize,

    /// Number of non-empty appends
    appends: u64,

    /// Live subscriptions keyed by subscription ID
    subscribers: HashMap<u64, ChunkSender>,

    /// Set once by `close`, never cleared
    closed: bool,

    /// Next subscription ID to hand out
    next_id: u64,
}

impl BufferState {
    pub(super) fn new() -> Self {
        Self {
            history: Vec::new(),
            len: 0,
            appends: 0,
            subscribers: HashMap::new(),
            closed: false,
            next_id: 1,
        }
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(super) fn len(&self) -> usize {
        self.len
    }

    pub(super) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Append a chunk to history and push it to every subscriber
    ///
    /// Returns the number of subscribers that received the chunk. Senders
    /// whose receiver is already gone are pruned.
    pub(super) fn push(&mut self, chunk: Bytes) -> usize {
        self.len += chunk.len();
        self.appends += 1;
        self.history.push(chunk.clone());

        self.subscribers
            .retain(|_, tx| tx.send(chunk.clone()).is_ok());
        self.subscribers.len()
    }

    /// Enqueue the current history on `tx` and register it for live delivery
    ///
    /// On a closed buffer the sender is dropped after the replay instead of
    /// being registered, so the subscriber sees history then end-of-stream.
    /// Returns the subscription ID.
    pub(super) fn attach(&mut self, tx: ChunkSender) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let history = self.compact();
        if !history.is_empty() && tx.send(history).is_err() {
            return id;
        }

        if !self.closed {
            self.subscribers.insert(id, tx);
        }
        id
    }

    /// Remove a subscriber, returning whether it was registered
    pub(super) fn detach(&mut self, id: u64) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Mark the buffer closed and drop every sender
    ///
    /// Returns the number of subscribers that were ended, or `None` if the
    /// buffer was already closed.
    pub(super) fn close(&mut self) -> Option<usize> {
        if self.closed {
            return None;
        }
        self.closed = true;
        let ended = self.subscribers.len();
        self.subscribers.clear();
        Some(ended)
    }

    /// Merge the history into one chunk and return a handle to it
    ///
    /// Calls with no append in between hand out the same allocation.
    pub(super) fn compact(&mut self) -> Bytes {
        if self.history.len() > 1 {
            let mut merged = BytesMut::with_capacity(self.len);
            for chunk in &self.history {
                merged.extend_from_slice(chunk);
            }
            self.history = vec![merged.freeze()];
        }
        self.history.first().cloned().unwrap_or_default()
    }

    pub(super) fn stats(&self) -> BufferStats {
        BufferStats {
            len: self.len,
            appends: self.appends,
            subscribers: self.subscribers.len(),
            closed: self.closed,
        }
    }
}

/// Statistics for a broadcast buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStats {
    /// Bytes appended so far
    pub len: usize,
    /// Number of non-empty appends so far
    pub appends: u64,
    /// Currently registered subscriptions
    pub subscribers: usize,
    /// Whether the buffer has been closed
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_fans_out() {
        let mut state = BufferState::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.attach(tx);

        assert_eq!(state.push(Bytes::from_static(b"ab")), 1);
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"ab"));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_push_prunes_dead_receivers() {
        let mut state = BufferState::new();
        let (tx, rx) = mpsc::unbounded_channel();
        state.attach(tx);
        drop(rx);

        assert_eq!(state.push(Bytes::from_static(b"x")), 0);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_attach_replays_history() {
        let mut state = BufferState::new();
        state.push(Bytes::from_static(b"hello "));
        state.push(Bytes::from_static(b"world"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.attach(tx);
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"hello world"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_late_joiners_share_history_allocation() {
        let mut state = BufferState::new();
        for _ in 0..1000 {
            state.push(Bytes::from(vec![7u8; 1024]));
        }

        let (tx, mut first) = mpsc::unbounded_channel();
        state.attach(tx);
        let (tx, mut second) = mpsc::unbounded_channel();
        state.attach(tx);

        let first = first.try_recv().unwrap();
        let second = second.try_recv().unwrap();
        assert_eq!(first.len(), 1024 * 1000);
        assert_eq!(first.as_ptr(), second.as_ptr());

        state.push(Bytes::from_static(b"tail"));
        let (tx, mut third) = mpsc::unbounded_channel();
        state.attach(tx);
        let third = third.try_recv().unwrap();
        assert_eq!(third.len(), 1024 * 1000 + 4);
        assert_eq!(&third[third.len() - 4..], b"tail");
        assert_eq!(state.stats().appends, 1001);
    }

    #[test]
    fn test_attach_after_close_ends_channel() {
        let mut state = BufferState::new();
        state.push(Bytes::from_static(b"done"));
        state.close();

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.attach(tx);
        assert_eq!(state.subscriber_count(), 0);
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"done"));
        assert_eq!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut state = BufferState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        state.attach(tx);

        assert_eq!(state.close(), Some(1));
        assert_eq!(state.close(), None);
        assert!(state.is_closed());
    }

    #[test]
    fn test_detach() {
        let mut state = BufferState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = state.attach(tx);

        assert!(state.detach(id));
        assert!(!state.detach(id));
    }

    #[test]
    fn test_stats() {
        let mut state = BufferState::new();
        state.push(Bytes::from_static(b"abc"));
        state.push(Bytes::from_static(b"d"));

        let (tx, _rx) = mpsc::unbounded_channel();
        state.attach(tx);

        let stats = state.stats();
        assert_eq!(stats.len, 4);
        assert_eq!(stats.appends, 2);
        assert_eq!(stats.subscribers, 1);
        assert!(!stats.closed);
    }
}
