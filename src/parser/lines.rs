//! Bounded splitting of a byte stream into physical lines.
//!
//! A [`LineSplitter`] never buffers more than `max_line_bytes` plus a two
//! byte line ending. A source without newlines therefore fails with
//! [`BklogError::LineTooLong`] as soon as the cap is reached instead of being
//! read into memory whole.

use crate::error::{BklogError, Result};
use std::io::{BufRead, ErrorKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Longest line ending stripped from a line (`\r\n`)
const MAX_LINE_ENDING: usize = 2;

/// Reusable line buffer with a hard size cap
#[derive(Debug)]
pub struct LineSplitter {
    buffer: Vec<u8>,
    max_line_bytes: usize,
    line_number: u64,
}

impl LineSplitter {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_line_bytes.min(4096) + MAX_LINE_ENDING),
            max_line_bytes,
            line_number: 0,
        }
    }

    /// Lines returned so far
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }

    /// Read the next line from `reader`, without its line ending
    ///
    /// Returns `None` at end of input.
    pub fn read_line<R: BufRead + ?Sized>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
        self.buffer.clear();
        loop {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BklogError::file_error("Failed to read log line", e)),
            };
            if available.is_empty() {
                break;
            }
            let (used, ends_line) = self.feed(available)?;
            reader.consume(used);
            if ends_line {
                break;
            }
        }
        self.take_line()
    }

    /// Async counterpart of [`LineSplitter::read_line`]
    pub async fn read_line_async<R>(&mut self, reader: &mut R) -> Result<Option<&[u8]>>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        self.buffer.clear();
        loop {
            let available = reader
                .fill_buf()
                .await
                .map_err(|e| BklogError::file_error("Failed to read log line", e))?;
            if available.is_empty() {
                break;
            }
            let (used, ends_line) = self.feed(available)?;
            reader.consume(used);
            if ends_line {
                break;
            }
        }
        self.take_line()
    }

    /// Append the part of `available` that belongs to the current line
    ///
    /// Returns the byte count to consume from the source and whether a
    /// newline ended the line. Fails before buffering past the cap.
    fn feed(&mut self, available: &[u8]) -> Result<(usize, bool)> {
        let (chunk, ends_line) = match memchr::memchr(b'\n', available) {
            Some(end) => (&available[..=end], true),
            None => (available, false),
        };
        let cap = self.max_line_bytes.saturating_add(MAX_LINE_ENDING);
        if self.buffer.len() + chunk.len() > cap {
            return Err(BklogError::LineTooLong {
                line: self.line_number + 1,
                limit: self.max_line_bytes,
            });
        }
        self.buffer.extend_from_slice(chunk);
        Ok((chunk.len(), ends_line))
    }

    fn take_line(&mut self) -> Result<Option<&[u8]>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.line_number += 1;
        let line = trim_line_ending(&self.buffer);
        if line.len() > self.max_line_bytes {
            return Err(BklogError::LineTooLong {
                line: self.line_number,
                limit: self.max_line_bytes,
            });
        }
        Ok(Some(line))
    }
}

/// Strip one `\n` and then one `\r` from the end of a line
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
