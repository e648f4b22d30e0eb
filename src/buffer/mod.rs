//! Broadcast buffer for single-producer, multi-consumer byte fan-out
//!
//! The buffer keeps every appended chunk and pushes new chunks to each
//! subscription over its own unbounded `tokio::sync::mpsc` channel.
//!
//! # Architecture
//!
//! ```text
//!                       BroadcastBuffer (Arc<Shared>)
//!                    ┌──────────────────────────────┐
//!                    │ Mutex<BufferState {          │
//!                    │   history: Vec<Bytes>,       │
//!                    │   subscribers: HashMap<id,   │
//!                    │     UnboundedSender>,        │
//!                    │   closed,                    │
//!                    │ }>                           │
//!                    └──────────────┬───────────────┘
//!                                   │
//!        ┌──────────────────────────┼──────────────────────────┐
//!        │                          │                          │
//!        ▼                          ▼                          ▼
//!   [Producer]               [Subscription]             [Subscription]
//!   append()/close()         replay + live              replay + live
//!                            rx.recv() ──► u8           rx.recv() ──► u8
//! ```
//!
//! `subscribe` enqueues the current history on the new channel and
//! registers its sender under the same lock that `append` takes, so no
//! chunk can fall between the replay and live delivery.
//!
//! # Zero-Copy Design
//!
//! History chunks are `bytes::Bytes`, so fan-out clones the reference count,
//! not the data. On subscribe the history is merged in place into one chunk
//! that every later joiner shares until the next append.

pub mod config;
pub mod state;
pub mod store;
pub mod subscription;

pub use config::BufferConfig;
pub use state::BufferStats;
pub use store::BroadcastBuffer;
pub use subscription::ByteSubscription;
