// src/exec/launcher.rs

//! Starting one job: pipes, child process, pipers, pumps and reaper.
//!
//! The controller talks to a [`Launcher`] rather than to the OS directly, so
//! tests can replace process creation with a scripted fake while keeping the
//! real scheduling and output paths.

use std::ffi::CString;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tokio::net::unix::pipe;
use tokio::process::Command;
use tracing::debug;

use crate::engine::mux::{EventSender, MuxEvent};
use crate::engine::scheduler::LaunchRequest;
use crate::errors::{Result, WithinError};
use crate::exec::pump::{spawn_reaper, spawn_stream_pump};
use crate::piper::{Piper, PiperRegistry};
use crate::types::{JobOutcome, RunPlan, StreamKind};

/// Exit status recorded for a job whose child could not change directory or
/// start the command.
pub const LAUNCH_FAILURE_CODE: i32 = 1;

/// Trait abstracting how one job gets started.
///
/// An implementation must register exactly two pipers (stdout, then stderr)
/// for the job and arrange for one `JobExited` event plus a `Closed` event
/// per piper to reach the multiplexer eventually. Returning an error aborts
/// the whole run.
pub trait Launcher {
    fn spawn(&mut self, request: &LaunchRequest, registry: &mut PiperRegistry) -> Result<()>;
}

/// Launcher that runs the command as a real child process.
#[derive(Debug)]
pub struct ProcessLauncher {
    command: Vec<String>,
    events: EventSender,
}

impl ProcessLauncher {
    pub fn new(command: Vec<String>, events: EventSender) -> Self {
        Self { command, events }
    }

    pub fn from_plan(plan: &RunPlan, events: EventSender) -> Self {
        Self::new(plan.command.clone(), events)
    }

    fn build_command(
        &self,
        directory: &str,
        stdout: io::PipeWriter,
        stderr: io::PipeWriter,
    ) -> Result<Command> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(WithinError::Usage("no command given".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(directory)
            .stdout(stdout)
            .stderr(stderr);
        Ok(cmd)
    }

    /// Stand-in for a child that died in chdir/exec: its stderr carries the
    /// diagnostic, both streams close, and the job exits nonzero.
    fn report_launch_failure(
        &self,
        request: &LaunchRequest,
        error: &io::Error,
        registry: &mut PiperRegistry,
    ) {
        let operation = if failed_in_chdir(&request.directory, error) {
            "chdir"
        } else {
            self.command.first().map(String::as_str).unwrap_or("exec")
        };

        debug!(
            job = %request.job,
            dir = %request.directory,
            operation,
            error = %error,
            "child failed before running the command"
        );

        let stdout = registry.add(Piper::new(request.job, StreamKind::Stdout, &request.directory));
        let stderr = registry.add(Piper::new(request.job, StreamKind::Stderr, &request.directory));
        let diagnostic = format!("within: {operation}: {error}\n").into_bytes();
        let events = self.events.clone();
        let job = request.job;

        tokio::spawn(async move {
            let sequence = [
                MuxEvent::Data {
                    piper: stderr,
                    chunk: diagnostic,
                },
                MuxEvent::Closed { piper: stderr },
                MuxEvent::Closed { piper: stdout },
                MuxEvent::JobExited {
                    job,
                    outcome: JobOutcome::Failed(LAUNCH_FAILURE_CODE),
                },
            ];
            for event in sequence {
                if events.send(event).await.is_err() {
                    return;
                }
            }
        });
    }
}

impl Launcher for ProcessLauncher {
    fn spawn(&mut self, request: &LaunchRequest, registry: &mut PiperRegistry) -> Result<()> {
        let (stdout_rx, stdout_tx) = io::pipe().map_err(WithinError::Pipe)?;
        let (stderr_rx, stderr_tx) = io::pipe().map_err(WithinError::Pipe)?;

        // The command owns the parent's copies of the write ends; it is
        // dropped at the end of this statement so the read ends see EOF once
        // the child is done with them.
        let spawned = self
            .build_command(&request.directory, stdout_tx, stderr_tx)?
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(error) if is_resource_exhaustion(&error) => return Err(WithinError::Fork(error)),
            Err(error) => {
                self.report_launch_failure(request, &error, registry);
                return Ok(());
            }
        };

        let stdout = pipe::Receiver::from_owned_fd(OwnedFd::from(stdout_rx))
            .map_err(WithinError::Pipe)?;
        let stderr = pipe::Receiver::from_owned_fd(OwnedFd::from(stderr_rx))
            .map_err(WithinError::Pipe)?;

        let stdout_id = registry.add(Piper::new(request.job, StreamKind::Stdout, &request.directory));
        let stderr_id = registry.add(Piper::new(request.job, StreamKind::Stderr, &request.directory));

        debug!(
            job = %request.job,
            dir = %request.directory,
            pid = child.id(),
            stdout = %stdout_id,
            stderr = %stderr_id,
            "job launched"
        );

        spawn_stream_pump(stdout_id, stdout, self.events.clone());
        spawn_stream_pump(stderr_id, stderr, self.events.clone());
        spawn_reaper(request.job, child, self.events.clone());

        Ok(())
    }
}

/// Errors from creating the child itself (fork, descriptor limits), as
/// opposed to errors the child hit in chdir/exec.
fn is_resource_exhaustion(error: &io::Error) -> bool {
    // ENFILE and EMFILE have these values on Linux, macOS and the BSDs.
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;

    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::OutOfMemory
    ) || matches!(error.raw_os_error(), Some(ENFILE | EMFILE))
}

/// std reports chdir and exec failures the same way, so tell them apart by
/// whether the directory can be entered at all.
fn failed_in_chdir(directory: &str, error: &io::Error) -> bool {
    let path = Path::new(directory);
    chdir_failed(path.is_dir(), || can_search(path), error.kind())
}

fn chdir_failed(is_dir: bool, searchable: impl FnOnce() -> bool, kind: io::ErrorKind) -> bool {
    !is_dir || (kind == io::ErrorKind::PermissionDenied && !searchable())
}

/// Whether this process may enter `dir` (search permission).
fn can_search(dir: &Path) -> bool {
    let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string for the whole call.
    unsafe { libc::access(c_path.as_ptr(), libc::X_OK) == 0 }
}
