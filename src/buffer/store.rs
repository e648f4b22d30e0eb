//! Broadcast buffer implementation
//!
//! The producer-facing handle. All state transitions (append, close,
//! subscribe, unsubscribe) run under one lock so that a subscriber's
//! history replay and its registration for live delivery are atomic with
//! respect to appends.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{BufferError, DecodeError};
use crate::stream::{ByteSequence, ByteStreamExt, Lines, TextEncoding};

use super::config::BufferConfig;
use super::state::{BufferState, BufferStats};
use super::subscription::ByteSubscription;

/// State shared between buffer handles and (weakly) their subscriptions
pub(super) struct Shared {
    config: BufferConfig,
    state: Mutex<BufferState>,
}

impl Shared {
    /// Lock the state
    ///
    /// A poisoned lock means a previous mutation panicked halfway, so the
    /// history can no longer be trusted.
    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state
            .lock()
            .unwrap_or_else(|_| {
                panic!("broadcast buffer `{}` state poisoned", self.config.name)
            })
    }

    /// Deregister a subscription, used from `Drop`
    pub(super) fn detach(&self, id: u64) {
        // Never panic while dropping a subscription.
        if let Ok(mut state) = self.state.lock() {
            if state.detach(id) {
                tracing::debug!(
                    buffer = %self.config.name,
                    subscription = id,
                    subscribers = state.subscriber_count(),
                    "Subscription dropped"
                );
            }
        }
    }
}

/// Single-producer, multi-consumer broadcast byte buffer
///
/// Every subscription sees the full history from the first appended byte,
/// followed by every byte appended afterward, until the buffer is closed.
/// Cloning the handle shares the same buffer.
///
/// Delivery is push-based over an unbounded channel per subscription, so a
/// slow reader never stalls `append`.
///
/// # Example
/// ```
/// use broadcast_bytes::{BroadcastBuffer, ByteStreamExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), broadcast_bytes::BufferError> {
/// let buffer = BroadcastBuffer::new();
/// let early = buffer.subscribe();
///
/// buffer.append("hello\n")?;
/// buffer.append("world")?;
/// let late = buffer.subscribe();
/// buffer.close();
///
/// assert_eq!(&early.collect_bytes().await[..], b"hello\nworld");
/// assert_eq!(&late.collect_bytes().await[..], b"hello\nworld");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BroadcastBuffer {
    shared: Arc<Shared>,
}

impl BroadcastBuffer {
    /// Create a new buffer with default configuration
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Create a new buffer with custom configuration
    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(BufferState::new()),
            }),
        }
    }

    /// Get the buffer configuration
    pub fn config(&self) -> &BufferConfig {
        &self.shared.config
    }

    fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Append bytes and deliver them to every live subscription
    ///
    /// Appending an empty chunk to an open buffer does nothing.
    ///
    /// # Errors
    /// Returns [`BufferError::Closed`] if the buffer has been closed.
    ///
    /// # Panics
    /// Panics if the buffer's lock was poisoned by an earlier panic.
    pub fn append(&self, bytes: impl Into<Bytes>) -> Result<(), BufferError> {
        let chunk = bytes.into();
        let mut state = self.shared.state();

        if state.is_closed() {
            tracing::warn!(
                buffer = %self.name(),
                bytes = chunk.len(),
                "Append rejected, buffer closed"
            );
            return Err(BufferError::Closed {
                name: self.name().to_string(),
            });
        }

        if chunk.is_empty() {
            return Ok(());
        }

        let size = chunk.len();
        let delivered = state.push(chunk);

        tracing::trace!(
            buffer = %self.name(),
            bytes = size,
            total = state.len(),
            subscribers = delivered,
            "Appended"
        );

        Ok(())
    }

    /// Append a borrowed slice, copying it into the history
    ///
    /// # Errors
    /// Returns [`BufferError::Closed`] if the buffer has been closed.
    pub fn append_slice(&self, bytes: &[u8]) -> Result<(), BufferError> {
        self.append(Bytes::copy_from_slice(bytes))
    }

    /// Close the buffer, ending every live subscription
    ///
    /// Subscriptions still drain whatever was queued for them before they
    /// observe end-of-stream. Closing twice is a no-op.
    ///
    /// # Panics
    /// Panics if the buffer's lock was poisoned by an earlier panic.
    pub fn close(&self) {
        let mut state = self.shared.state();

        match state.close() {
            Some(ended) => tracing::debug!(
                buffer = %self.name(),
                bytes = state.len(),
                subscribers = ended,
                "Buffer closed"
            ),
            None => tracing::trace!(buffer = %self.name(), "Buffer already closed"),
        }
    }

    /// Subscribe to the buffer
    ///
    /// The subscription first yields the whole history, then live appends.
    /// On a closed buffer it yields the history and ends immediately.
    ///
    /// # Panics
    /// Panics if the buffer's lock was poisoned by an earlier panic.
    pub fn subscribe(&self) -> ByteSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.shared.state();

        let id = state.attach(tx);

        tracing::debug!(
            buffer = %self.name(),
            subscription = id,
            replay_bytes = state.len(),
            subscribers = state.subscriber_count(),
            closed = state.is_closed(),
            "Subscriber added"
        );

        ByteSubscription::new(id, rx, Arc::downgrade(&self.shared))
    }

    /// Stop delivering to a subscription
    ///
    /// The subscription yields what was already queued for it, then ends.
    /// Safe to call repeatedly or after close. Subscriptions belonging to
    /// another buffer are ignored.
    ///
    /// # Panics
    /// Panics if the buffer's lock was poisoned by an earlier panic.
    pub fn unsubscribe(&self, subscription: &ByteSubscription) {
        if !Weak::ptr_eq(subscription.owner(), &Arc::downgrade(&self.shared)) {
            tracing::warn!(
                buffer = %self.name(),
                subscription = subscription.id(),
                "Unsubscribe ignored, subscription belongs to another buffer"
            );
            return;
        }

        let mut state = self.shared.state();
        if state.detach(subscription.id()) {
            tracing::debug!(
                buffer = %self.name(),
                subscription = subscription.id(),
                subscribers = state.subscriber_count(),
                "Subscriber removed"
            );
        }
    }

    /// Restartable byte sequence over this buffer
    pub fn bytes(&self) -> ByteSequence {
        ByteSequence::new(self.clone())
    }

    /// Lines of a fresh subscription
    pub fn lines(&self) -> Lines<ByteSubscription> {
        self.subscribe().lines()
    }

    /// Wait for the buffer to close, then return its contents
    pub async fn data(&self) -> Bytes {
        self.subscribe().collect_bytes().await
    }

    /// Wait for the buffer to close, then decode its contents as UTF-8
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the contents are not valid UTF-8.
    pub async fn string(&self) -> Result<String, DecodeError> {
        self.subscribe().collect_string().await
    }

    /// Wait for the buffer to close, then decode its contents
    ///
    /// # Errors
    /// Returns [`DecodeError`] if the contents are not valid in `encoding`.
    pub async fn string_with(&self, encoding: TextEncoding) -> Result<String, DecodeError> {
        self.subscribe().collect_string_with(encoding).await
    }

    /// Whether the buffer has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.state().is_closed()
    }

    /// Number of bytes appended so far
    pub fn len(&self) -> usize {
        self.shared.state().len()
    }

    /// Whether nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.state().subscriber_count()
    }

    /// Everything appended so far, as one contiguous chunk
    pub fn snapshot(&self) -> Bytes {
        self.shared.state().compact()
    }

    /// Get buffer statistics
    pub fn stats(&self) -> BufferStats {
        self.shared.state().stats()
    }
}

impl Default for BroadcastBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastBuffer")
            .field("name", &self.shared.config.name)
            .finish_non_exhaustive()
    }
}
