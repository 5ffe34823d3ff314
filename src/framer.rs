//! Line framing over raw transport chunks
//!
//! The collaborator delivers the event stream as terminator-delimited text
//! over a single persistent response body, but the transport hands it to us
//! as opaque byte chunks split at arbitrary offsets. [`LineFramer`] turns
//! that chunk sequence back into complete lines, carrying partial data
//! across chunk boundaries so a frame (or a multi-byte character inside
//! one) split by the transport is never corrupted.

use crate::error::{Error, Result};

/// Incremental line framer with an explicit carry-over buffer
///
/// The carry-over is kept as raw bytes and only decoded once a terminator
/// arrives, so a UTF-8 sequence split across two chunks simply stays
/// buffered until its line completes. The buffer is explicit state owned by
/// the framer, which makes it independently testable with arbitrary chunk
/// splits.
#[derive(Debug)]
pub struct LineFramer {
    /// Bytes received after the last emitted terminator
    buf: Vec<u8>,
    /// Cap on the unterminated carry-over; exceeding it fails the stream
    max_line_bytes: usize,
}

impl LineFramer {
    /// Create a framer with the given carry-over cap in bytes
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line_bytes,
        }
    }

    /// Consume one transport chunk and return all lines it completed
    ///
    /// Lines are returned in arrival order with the `\n` terminator (and a
    /// preceding `\r`, if any) stripped. The final unterminated fragment is
    /// retained as the new carry-over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the retained carry-over exceeds the
    /// configured cap, which means the collaborator is emitting a line the
    /// client is unwilling to buffer.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        // Only the unterminated remainder is capped: a long line that
        // completed within this chunk has already been emitted above.
        if self.buf.len() > self.max_line_bytes {
            self.buf.clear();
            return Err(Error::Transport(format!(
                "buffered line exceeded {} bytes without a terminator",
                self.max_line_bytes
            )));
        }

        Ok(lines)
    }

    /// Drop any retained carry-over at end-of-stream
    ///
    /// A trailing unterminated frame is never honored: the terminator is
    /// what marks a frame as completely delivered, so bytes after the last
    /// one are discarded. Returns the number of bytes dropped so the caller
    /// can log it.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    /// Current carry-over size in bytes
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
