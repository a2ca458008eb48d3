use std::fmt;
use std::num::NonZeroUsize;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use crate::errors::{Result, WithinError};

/// Position of a job's directory in the directory list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Stable key of a registered piper. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PiperId(pub u64);

impl fmt::Display for PiperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "piper#{}", self.0)
    }
}

/// Which of the caller's standard streams a piper writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Outcome of one job's process, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(i32),
}

impl JobOutcome {
    /// Map an exit code the way a shell would: 0 is success, anything else a
    /// failure carrying that code.
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            JobOutcome::Success
        } else {
            JobOutcome::Failed(code)
        }
    }

    /// Processes killed by a signal report `128 + signal`.
    pub fn from_exit_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => JobOutcome::from_code(code),
            (None, Some(signal)) => JobOutcome::Failed(128 + signal),
            (None, None) => JobOutcome::Failed(-1),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    pub fn code(&self) -> i32 {
        match self {
            JobOutcome::Success => 0,
            JobOutcome::Failed(code) => *code,
        }
    }
}

/// Fully resolved description of one run: what to execute, where, and how
/// many at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub max_jobs: NonZeroUsize,
    pub directories: Vec<String>,
    pub command: Vec<String>,
}

impl RunPlan {
    pub fn new(
        max_jobs: NonZeroUsize,
        directories: Vec<String>,
        command: Vec<String>,
    ) -> Result<Self> {
        if directories.is_empty() {
            return Err(WithinError::Usage("no directories given".to_string()));
        }
        if command.is_empty() {
            return Err(WithinError::Usage("no command given".to_string()));
        }
        Ok(Self {
            max_jobs,
            directories,
            command,
        })
    }
}
