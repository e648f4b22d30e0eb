//! Line splitting over byte streams

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

/// Stream of text lines read from a byte stream
///
/// Lines are split on `\n`; the terminator and one preceding `\r` are
/// stripped. A final line without terminator is still yielded, but a
/// trailing newline does not produce an extra empty line. Invalid UTF-8 is
/// replaced with U+FFFD.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct Lines<S> {
    stream: S,
    line: Vec<u8>,
    done: bool,
}

impl<S> Lines<S> {
    /// Creates a new `Lines` stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            line: Vec::new(),
            done: false,
        }
    }

    /// Unwraps the underlying byte stream, discarding any partial line
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn take_line(&mut self) -> String {
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        text
    }
}

impl<S: Stream<Item = u8> + Unpin> Lines<S> {
    /// Receive the next line, or `None` once the byte stream has ended
    pub async fn next(&mut self) -> Option<String> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Read every remaining line
    pub async fn collect_all(mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next().await {
            lines.push(line);
        }
        lines
    }
}

impl<S: Stream<Item = u8> + Unpin> Stream for Lines<S> {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut this.stream).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(b'\n')) => return Poll::Ready(Some(this.take_line())),
                Poll::Ready(Some(byte)) => this.line.push(byte),
                Poll::Ready(None) => {
                    this.done = true;
                    if this.line.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(this.take_line()));
                }
            }
        }
    }
}
