// src/piper/mod.rs

//! Line-prefixing of child output.
//!
//! A [`Piper`] is the parent-side state of one child stream: the directory
//! prefix, which caller stream it writes to, and whether the next byte starts
//! a new line. The bytes themselves arrive as events from the multiplexer;
//! the piper only turns them into prefixed output.
//!
//! - [`registry`] keeps the set of open pipers, keyed by [`PiperId`].

pub mod registry;

use std::io::{self, Write};

use crate::types::{JobId, StreamKind};

pub use registry::PiperRegistry;

/// Separator written between the directory and the line contents.
const PREFIX_SEPARATOR: &[u8] = b": ";

#[derive(Debug, Clone)]
pub struct Piper {
    job: JobId,
    stream: StreamKind,
    prefix: String,
    at_line_start: bool,
}

impl Piper {
    pub fn new(job: JobId, stream: StreamKind, prefix: impl Into<String>) -> Self {
        Self {
            job,
            stream,
            prefix: prefix.into(),
            at_line_start: true,
        }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    /// Write `chunk` to `out`, inserting `"<prefix>: "` before the first byte
    /// of every line.
    ///
    /// Bytes are passed through untouched. A chunk ending mid-line leaves the
    /// piper mid-line, so the next chunk continues that line without a
    /// second prefix. The whole prefixed chunk goes out in one `write_all`.
    pub fn consume(&mut self, chunk: &[u8], out: &mut dyn Write) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let lines = chunk.iter().filter(|&&b| b == b'\n').count() + 1;
        let mut buf =
            Vec::with_capacity(chunk.len() + lines * (self.prefix.len() + PREFIX_SEPARATOR.len()));

        for segment in chunk.split_inclusive(|&b| b == b'\n') {
            if self.at_line_start {
                buf.extend_from_slice(self.prefix.as_bytes());
                buf.extend_from_slice(PREFIX_SEPARATOR);
            }
            buf.extend_from_slice(segment);
            self.at_line_start = segment.last() == Some(&b'\n');
        }

        out.write_all(&buf)?;
        out.flush()
    }
}
