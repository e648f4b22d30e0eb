//! Error types
//!
//! `BufferError` is returned by buffer mutations, `DecodeError` by the text
//! aggregation adapter. `Error` wraps both plus I/O failures from the pipe
//! adapters.

use std::fmt;
use std::io;

use crate::stream::TextEncoding;

/// Error type for broadcast buffer operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Bytes were appended after the buffer was closed
    Closed {
        /// Name of the buffer, from its config
        name: String,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::Closed { name } => write!(f, "Buffer closed: {}", name),
        }
    }
}

impl std::error::Error for BufferError {}

/// Aggregated bytes were not valid in the requested text encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    /// Encoding that was requested
    pub encoding: TextEncoding,
    /// Byte offset of the first invalid sequence
    pub offset: usize,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} data at byte offset {}",
            self.encoding, self.offset
        )
    }
}

impl std::error::Error for DecodeError {}

/// Crate-level error
#[derive(Debug)]
pub enum Error {
    /// Buffer operation failed
    Buffer(BufferError),
    /// Text decoding failed
    Decode(DecodeError),
    /// Reading from or forwarding to an I/O handle failed
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Buffer(e) => write!(f, "{}", e),
            Error::Decode(e) => write!(f, "{}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Buffer(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Error::Buffer(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias using the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
