//! Buffer configuration

/// Default chunk size used when pumping a reader into a buffer
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Broadcast buffer configuration options
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Label used in log fields and errors
    pub name: String,

    /// Read size used by [`pump`](crate::stream::pump)
    pub read_buffer_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            name: "buffer".to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl BufferConfig {
    /// Create a default config with the given name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the pump read size (clamped to at least one byte)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}
