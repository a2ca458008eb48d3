// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every variant's message starts with the operation that failed, so the
//! binary can print it as a single `within: <operation>: <cause>` line.

use std::io;

use thiserror::Error;

use crate::types::StreamKind;

#[derive(Error, Debug)]
pub enum WithinError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("config: {0}")]
    ConfigError(String),

    /// Creating a stdout/stderr channel for a job failed.
    #[error("pipe: {0}")]
    Pipe(io::Error),

    /// The OS refused to create another process.
    #[error("fork: {0}")]
    Fork(io::Error),

    #[error("read {stream} of {directory}: {error}")]
    Read {
        directory: String,
        stream: StreamKind,
        error: io::Error,
    },

    #[error("wait for job in {directory}: {error}")]
    Reap { directory: String, error: io::Error },

    #[error("write {stream}: {error}")]
    Write { stream: StreamKind, error: io::Error },

    #[error("event stream closed while work was outstanding")]
    EventStreamClosed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, WithinError>;
