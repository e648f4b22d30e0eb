//! Byte stream adapters
//!
//! This module provides:
//! - `ByteSequence`, the restartable view of a broadcast buffer
//! - Line splitting over any `Stream<Item = u8>`
//! - Aggregation into `Bytes` or decoded text
//! - `PipeBytes` and `pump` for OS pipes and other async readers

pub mod collect;
pub mod lines;
pub mod pipe;
pub mod sequence;

use futures_core::Stream;

pub use collect::{Collect, CollectString, TextEncoding};
pub use lines::Lines;
pub use pipe::{pump, PipeBytes};
pub use sequence::ByteSequence;

/// Adapters available on every byte stream
pub trait ByteStreamExt: Stream<Item = u8> + Sized {
    /// Split the stream into text lines
    fn lines(self) -> Lines<Self> {
        Lines::new(self)
    }

    /// Consume the stream to its end, returning every byte
    fn collect_bytes(self) -> Collect<Self> {
        Collect::new(self)
    }

    /// Consume the stream to its end and decode it as UTF-8
    fn collect_string(self) -> CollectString<Self> {
        CollectString::new(self, TextEncoding::Utf8)
    }

    /// Consume the stream to its end and decode it with `encoding`
    fn collect_string_with(self, encoding: TextEncoding) -> CollectString<Self> {
        CollectString::new(self, encoding)
    }
}

impl<S: Stream<Item = u8>> ByteStreamExt for S {}
