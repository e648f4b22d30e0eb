//! Restartable byte sequence over a broadcast buffer

use bytes::Bytes;

use crate::buffer::{BroadcastBuffer, ByteSubscription};
use crate::error::DecodeError;

use super::{ByteStreamExt, Lines, TextEncoding};

/// Restartable byte sequence
///
/// Each call to [`subscribe`](Self::subscribe) starts a new, independent
/// subscription that replays the buffer from its first byte. A sequence
/// without a buffer is permanently empty.
#[derive(Debug, Clone, Default)]
pub struct ByteSequence {
    buffer: Option<BroadcastBuffer>,
}

impl ByteSequence {
    /// Sequence reading from `buffer`
    pub fn new(buffer: BroadcastBuffer) -> Self {
        Self {
            buffer: Some(buffer),
        }
    }

    /// Sequence that ends immediately
    pub fn empty() -> Self {
        Self { buffer: None }
    }

    /// Start a new pass over the sequence
    pub fn subscribe(&self) -> ByteSubscription {
        match &self.buffer {
            Some(buffer) => buffer.subscribe(),
            None => ByteSubscription::empty(),
        }
    }

    /// Lines of a new pass
    pub fn lines(&self) -> Lines<ByteSubscription> {
        self.subscribe().lines()
    }

    /// Wait for end-of-stream, then return every byte
    pub async fn data(&self) -> Bytes {
        self.subscribe().collect_bytes().await
    }

    /// Wait for end-of-stream, then decode every byte as UTF-8
    pub async fn string(&self) -> Result<String, DecodeError> {
        self.subscribe().collect_string().await
    }

    /// Wait for end-of-stream, then decode every byte with `encoding`
    pub async fn string_with(&self, encoding: TextEncoding) -> Result<String, DecodeError> {
        self.subscribe().collect_string_with(encoding).await
    }
}

impl From<BroadcastBuffer> for ByteSequence {
    fn from(buffer: BroadcastBuffer) -> Self {
        Self::new(buffer)
    }
}
