//! Tokio codec for newline-delimited command lines.
//!
//! # Overview
//!
//! [`LineCodec`] implements [`Decoder`] and [`Encoder`] so a TCP stream can
//! be wrapped in `FramedRead`/`FramedWrite`. Bytes that do not yet form a
//! complete line stay in the read buffer and are resumed on the next read,
//! so nothing ever waits for a terminator.
//!
//! # Line handling
//!
//! - A trailing `\r` and any trailing whitespace are stripped.
//! - Blank lines are skipped.
//! - A line longer than the configured maximum, not counting its line
//!   ending, is discarded up to the next terminator and yielded once as
//!   [`Line::Overlong`]. Decoding then resumes normally, so one bad line
//!   does not end the stream.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use doorkeeper_protocol::{Line, LineCodec};
//!
//! let mut codec = LineCodec::new();
//! let mut buf = BytesMut::from(&b"Open A\r\nSta"[..]);
//!
//! assert_eq!(codec.decode(&mut buf).unwrap(), Some(Line::Text("Open A".into())));
//! assert_eq!(codec.decode(&mut buf).unwrap(), None);
//!
//! buf.extend_from_slice(b"tus\n");
//! assert_eq!(codec.decode(&mut buf).unwrap(), Some(Line::Text("Status".into())));
//! ```

use bytes::{Buf, BufMut, BytesMut};
use doorkeeper_core::constants::{LINE_TERMINATOR, MAX_LINE_LENGTH};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// One decoded item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A complete line with its terminator and trailing whitespace removed.
    Text(String),
    /// A line exceeding the maximum length was dropped.
    Overlong { length: usize },
}

/// Newline-delimited line codec with a length limit.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Offset up to which the buffer is known not to contain a terminator.
    next_index: usize,
    /// Bytes dropped so far while skipping an overlong line.
    discarding: Option<usize>,
}

impl LineCodec {
    /// Create a codec accepting lines up to [`MAX_LINE_LENGTH`] bytes.
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec with a custom line length limit (terminator excluded).
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: None,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Line;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Line>, ProtocolError> {
        loop {
            let terminator = src[self.next_index..]
                .iter()
                .position(|b| *b == LINE_TERMINATOR)
                .map(|offset| self.next_index + offset);

            if let Some(dropped) = self.discarding {
                match terminator {
                    Some(end) => {
                        src.advance(end + 1);
                        self.next_index = 0;
                        self.discarding = None;
                        return Ok(Some(Line::Overlong {
                            length: dropped + end,
                        }));
                    }
                    None => {
                        self.discarding = Some(dropped + src.len());
                        src.clear();
                        self.next_index = 0;
                        return Ok(None);
                    }
                }
            }

            let Some(end) = terminator else {
                // One extra byte for a pending `\r`.
                if src.len() > self.max_length + 1 {
                    self.discarding = Some(src.len());
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let raw = src.split_to(end + 1);
            self.next_index = 0;

            let body = raw[..end].strip_suffix(b"\r").unwrap_or(&raw[..end]);
            if body.len() > self.max_length {
                return Ok(Some(Line::Overlong { length: body.len() }));
            }

            let text = String::from_utf8_lossy(body);
            let text = text.trim_end();
            if text.is_empty() {
                continue;
            }
            return Ok(Some(Line::Text(text.to_string())));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Line>, ProtocolError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        // An unterminated tail at EOF is not a command.
        src.clear();
        self.next_index = 0;
        self.discarding = None;
        Ok(None)
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = line.as_ref();
        dst.reserve(line.len() + 1);
        dst.put(line.as_bytes());
        dst.put_u8(LINE_TERMINATOR);
        Ok(())
    }
}
