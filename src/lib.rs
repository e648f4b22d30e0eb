//! Broadcast byte buffers
//!
//! A [`BroadcastBuffer`] is an append-only byte buffer with one producer and
//! any number of independent readers. Every reader sees the whole history
//! from the first byte, whenever it joins, followed by each byte appended
//! afterward, until the buffer is closed.
//!
//! Readers are [`ByteSubscription`]s, which implement
//! `futures_core::Stream<Item = u8>`. The adapters in [`stream`] turn any such
//! stream into lines or an aggregate block of bytes or text, and expose OS
//! pipes as byte streams.
//!
//! ```
//! use broadcast_bytes::BroadcastBuffer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let buffer = BroadcastBuffer::new();
//! let mut lines = buffer.lines();
//!
//! buffer.append("hello\nworld").unwrap();
//! buffer.close();
//!
//! assert_eq!(lines.next().await.as_deref(), Some("hello"));
//! assert_eq!(lines.next().await.as_deref(), Some("world"));
//! assert_eq!(buffer.string().await.unwrap(), "hello\nworld");
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod stream;

pub use buffer::{BroadcastBuffer, BufferConfig, BufferStats, ByteSubscription};
pub use error::{BufferError, DecodeError, Error, Result};
pub use stream::{pump, ByteSequence, ByteStreamExt, Lines, PipeBytes, TextEncoding};
