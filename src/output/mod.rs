// src/output/mod.rs

//! Destinations for prefixed child output.
//!
//! Production runs write to the caller's own stdout/stderr; tests swap in
//! [`CaptureBuffer`]s to inspect exactly what would have been printed.

pub mod capture;

use std::fmt;
use std::io::Write;

use crate::types::StreamKind;

pub use capture::CaptureBuffer;

/// The two output streams every piper writes to, one per [`StreamKind`].
pub struct Sinks {
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sinks").finish_non_exhaustive()
    }
}

impl Sinks {
    pub fn new(stdout: impl Write + Send + 'static, stderr: impl Write + Send + 'static) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// The calling process's own standard streams.
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }

    pub fn get_mut(&mut self, stream: StreamKind) -> &mut dyn Write {
        match stream {
            StreamKind::Stdout => self.stdout.as_mut(),
            StreamKind::Stderr => self.stderr.as_mut(),
        }
    }
}
