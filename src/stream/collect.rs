//! Aggregation of byte streams
//!
//! [`Collect`] drains a byte stream into one `Bytes` block and
//! [`CollectString`] additionally decodes it. Both resolve only once the
//! stream ends, so for a buffer subscription they wait for `close`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use futures_core::Stream;

use crate::error::DecodeError;

/// Text encodings supported by [`CollectString`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// UTF-8
    #[default]
    Utf8,
    /// UTF-16, little endian
    Utf16Le,
    /// UTF-16, big endian
    Utf16Be,
    /// ISO-8859-1; every byte maps to the code point of the same value
    Latin1,
    /// 7-bit ASCII
    Ascii,
}

impl TextEncoding {
    /// Decode `bytes`, failing on the first invalid sequence
    pub fn decode(self, bytes: &[u8]) -> Result<String, DecodeError> {
        let invalid = |offset| DecodeError {
            encoding: self,
            offset,
        };

        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| invalid(e.valid_up_to())),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                let units = bytes.chunks_exact(2).map(|pair| {
                    let pair = [pair[0], pair[1]];
                    if self == TextEncoding::Utf16Le {
                        u16::from_le_bytes(pair)
                    } else {
                        u16::from_be_bytes(pair)
                    }
                });

                let mut out = String::with_capacity(bytes.len() / 2);
                let mut offset = 0;
                for ch in char::decode_utf16(units) {
                    let ch = ch.map_err(|_| invalid(offset))?;
                    offset += ch.len_utf16() * 2;
                    out.push(ch);
                }
                if bytes.len() % 2 != 0 {
                    return Err(invalid(bytes.len() - 1));
                }
                Ok(out)
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(invalid(offset)),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Utf16Be => "UTF-16BE",
            TextEncoding::Latin1 => "ISO-8859-1",
            TextEncoding::Ascii => "ASCII",
        };
        f.write_str(name)
    }
}

/// Future returned by [`ByteStreamExt::collect_bytes`](super::ByteStreamExt::collect_bytes)
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Collect<S> {
    stream: S,
    data: BytesMut,
}

impl<S> Collect<S> {
    pub(super) fn new(stream: S) -> Self {
        Self {
            stream,
            data: BytesMut::new(),
        }
    }
}

impl<S: Stream<Item = u8> + Unpin> Future for Collect<S> {
    type Output = Bytes;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Bytes> {
        let this = self.get_mut();
        loop {
            match ready!(Pin::new(&mut this.stream).poll_next(cx)) {
                Some(byte) => {
                    if this.data.is_empty() {
                        let (lower, _) = this.stream.size_hint();
                        this.data.reserve(lower + 1);
                    }
                    this.data.put_u8(byte);
                }
                None => return Poll::Ready(std::mem::take(&mut this.data).freeze()),
            }
        }
    }
}

/// Future returned by [`ByteStreamExt::collect_string`](super::ByteStreamExt::collect_string)
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct CollectString<S> {
    inner: Collect<S>,
    encoding: TextEncoding,
}

impl<S> CollectString<S> {
    pub(super) fn new(stream: S, encoding: TextEncoding) -> Self {
        Self {
            inner: Collect::new(stream),
            encoding,
        }
    }
}

impl<S: Stream<Item = u8> + Unpin> Future for CollectString<S> {
    type Output = Result<String, DecodeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let data = ready!(Pin::new(&mut this.inner).poll(cx));
        Poll::Ready(this.encoding.decode(&data))
    }
}
