//! Input framing for raw TCP clients
//!
//! Clients may end lines with `\n` or `\r\n`. Bytes that are not valid
//! UTF-8 are replaced rather than rejected, since terminal clients send
//! whatever their locale produces.

use super::{TransportError, MAX_LINE_LEN};
use bytes::BytesMut;
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads client input one line at a time
#[derive(Debug)]
pub struct InputLines<R> {
    stream: R,
    pending: BytesMut,
    /// Bytes of `pending` already searched for a newline
    searched: usize,
    limit: usize,
}

impl<R> InputLines<R> {
    pub fn new(stream: R) -> Self {
        Self::with_limit(stream, MAX_LINE_LEN)
    }

    /// Frame with a line length limit other than [`MAX_LINE_LEN`]
    pub fn with_limit(stream: R, limit: usize) -> Self {
        Self {
            stream,
            pending: BytesMut::with_capacity(1024),
            searched: 0,
            limit: limit.max(1),
        }
    }
}

impl<R: AsyncRead + Unpin> InputLines<R> {
    /// Wait for the next line, without its terminator.
    ///
    /// End of stream is [`TransportError::Closed`], after any unterminated
    /// last line has been returned. Partial input stays buffered if the
    /// future is dropped.
    pub async fn next_line(&mut self) -> Result<String, TransportError> {
        loop {
            if let Some(offset) = memchr(b'\n', &self.pending[self.searched..]) {
                let line = self.pending.split_to(self.searched + offset + 1);
                self.searched = 0;
                return Ok(decode(&line));
            }
            self.searched = self.pending.len();

            if self.pending.len() > self.limit {
                return Err(TransportError::LineTooLong { max: self.limit });
            }

            if self.stream.read_buf(&mut self.pending).await? == 0 {
                if self.pending.is_empty() {
                    return Err(TransportError::Closed);
                }
                self.searched = 0;
                let rest = self.pending.split();
                return Ok(decode(&rest));
            }
        }
    }
}

fn decode(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
