// src/engine/controller.rs

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::engine::mux::{MuxEvent, Multiplexer};
use crate::engine::scheduler::{RunSummary, Scheduler};
use crate::errors::{Result, WithinError};
use crate::exec::Launcher;
use crate::output::Sinks;
use crate::piper::PiperRegistry;
use crate::types::{JobId, JobOutcome, PiperId};

/// Owns every piece of run state and drives it from multiplexer events.
///
/// The scheduler decides what to launch, the launcher starts it, and the
/// registry plus sinks turn stream events into prefixed output. All of it
/// is mutated only between waits, from this one control flow.
pub struct Controller<L: Launcher> {
    scheduler: Scheduler,
    registry: PiperRegistry,
    mux: Multiplexer,
    launcher: L,
    sinks: Sinks,
}

impl<L: Launcher> fmt::Debug for Controller<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("scheduler", &self.scheduler)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<L: Launcher> Controller<L> {
    pub fn new(scheduler: Scheduler, mux: Multiplexer, launcher: L, sinks: Sinks) -> Self {
        Self {
            scheduler,
            registry: PiperRegistry::new(),
            mux,
            launcher,
            sinks,
        }
    }

    /// Run every job to completion and drain all of their output.
    ///
    /// Returns once no job is running, none is pending and every stream has
    /// reached end-of-stream. Fatal errors (resource exhaustion, read/write
    /// failures) abort immediately; jobs already running are left alone.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(
            jobs = self.scheduler.pending_jobs(),
            max_jobs = self.scheduler.max_jobs().get(),
            "within run started"
        );

        self.try_launch()?;

        while !self.is_finished() {
            let Some(event) = self.mux.wait_next_event().await else {
                warn!(
                    active = self.scheduler.active_jobs(),
                    open_pipers = ?self.registry.ids(),
                    "every event source is gone"
                );
                return Err(WithinError::EventStreamClosed);
            };
            self.dispatch(event)?;
        }

        let summary = self.scheduler.summary();
        info!(
            jobs = summary.total_jobs,
            failed = summary.failed.len(),
            "within run finished"
        );
        Ok(summary)
    }

    /// Nothing running, nothing pending, no stream left open.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_drained() && self.registry.is_empty()
    }

    fn try_launch(&mut self) -> Result<()> {
        while let Some(request) = self.scheduler.next_launch() {
            debug!(
                job = %request.job,
                dir = %request.directory,
                active = self.scheduler.active_jobs(),
                "launching job"
            );
            self.launcher.spawn(&request, &mut self.registry)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: MuxEvent) -> Result<()> {
        match event {
            MuxEvent::JobExited { job, outcome } => {
                self.on_job_exit(job, outcome);
                self.try_launch()
            }
            MuxEvent::Data { piper, chunk } => self.on_data(piper, &chunk),
            MuxEvent::Closed { piper } => {
                self.on_end_of_stream(piper);
                Ok(())
            }
            MuxEvent::ReadFailed { piper, error } => {
                let (directory, stream) = match self.registry.remove(piper) {
                    Some(p) => (p.prefix().to_string(), p.stream()),
                    None => return Err(WithinError::Io(error)),
                };
                Err(WithinError::Read {
                    directory,
                    stream,
                    error,
                })
            }
            MuxEvent::ReapFailed { job, error } => Err(WithinError::Reap {
                directory: self.scheduler.directory_of(job).unwrap_or("?").to_string(),
                error,
            }),
        }
    }

    fn on_job_exit(&mut self, job: JobId, outcome: JobOutcome) {
        // Stream draining is tracked separately; the job's pipers stay
        // registered until their own end-of-stream.
        if self.scheduler.on_job_exit(job, outcome) {
            trace!(%job, open_streams = self.registry.open_for_job(job), "slot freed");
        }
    }

    fn on_data(&mut self, id: PiperId, chunk: &[u8]) -> Result<()> {
        let Some(piper) = self.registry.get_mut(id) else {
            warn!(piper = %id, bytes = chunk.len(), "data for unregistered piper; dropping");
            return Ok(());
        };

        let stream = piper.stream();
        trace!(piper = %id, %stream, bytes = chunk.len(), "consuming chunk");
        piper
            .consume(chunk, self.sinks.get_mut(stream))
            .map_err(|error| WithinError::Write { stream, error })
    }

    fn on_end_of_stream(&mut self, id: PiperId) {
        match self.registry.remove(id) {
            Some(piper) => debug!(
                piper = %id,
                job = %piper.job(),
                stream = %piper.stream(),
                remaining = self.registry.len(),
                "stream closed"
            ),
            None => warn!(piper = %id, "close for unregistered piper; ignoring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::num::NonZeroUsize;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::engine::mux::EventSender;
    use crate::engine::scheduler::LaunchRequest;
    use crate::output::CaptureBuffer;
    use crate::piper::Piper;
    use crate::types::StreamKind;

    /// Registers the two pipers and nothing else; the test plays the role of
    /// the child by sending events itself.
    #[derive(Default)]
    struct ManualLauncher {
        /// (directory, pipers open at launch time)
        launched: Arc<Mutex<Vec<(String, usize)>>>,
        /// Spawn attempt (0-based) that fails as if the OS ran out of processes.
        fork_fails_at: Option<usize>,
        attempts: usize,
    }

    impl Launcher for ManualLauncher {
        fn spawn(&mut self, request: &LaunchRequest, registry: &mut PiperRegistry) -> Result<()> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fork_fails_at == Some(attempt) {
                return Err(WithinError::Fork(io::Error::from(io::ErrorKind::WouldBlock)));
            }

            self.launched
                .lock()
                .unwrap()
                .push((request.directory.clone(), registry.len()));
            registry.add(Piper::new(request.job, StreamKind::Stdout, &request.directory));
            registry.add(Piper::new(request.job, StreamKind::Stderr, &request.directory));
            Ok(())
        }
    }

    struct Harness {
        tx: EventSender,
        controller: Controller<ManualLauncher>,
        launched: Arc<Mutex<Vec<(String, usize)>>>,
        stdout: CaptureBuffer,
        stderr: CaptureBuffer,
    }

    fn harness(dirs: &[&str], max_jobs: usize) -> Harness {
        let (tx, mux) = Multiplexer::channel();
        let launcher = ManualLauncher::default();
        let launched = launcher.launched.clone();
        let stdout = CaptureBuffer::new();
        let stderr = CaptureBuffer::new();
        let scheduler = Scheduler::new(
            dirs.iter().map(|d| d.to_string()),
            NonZeroUsize::new(max_jobs).unwrap(),
        );
        let controller = Controller::new(
            scheduler,
            mux,
            launcher,
            Sinks::new(stdout.clone(), stderr.clone()),
        );
        Harness {
            tx,
            controller,
            launched,
            stdout,
            stderr,
        }
    }

    async fn send_all(tx: &EventSender, events: Vec<MuxEvent>) {
        for event in events {
            tx.send(event).await.unwrap();
        }
    }

    fn data(piper: u64, bytes: &[u8]) -> MuxEvent {
        MuxEvent::Data {
            piper: PiperId(piper),
            chunk: bytes.to_vec(),
        }
    }

    fn closed(piper: u64) -> MuxEvent {
        MuxEvent::Closed {
            piper: PiperId(piper),
        }
    }

    fn exited(job: usize, code: i32) -> MuxEvent {
        MuxEvent::JobExited {
            job: JobId(job),
            outcome: JobOutcome::from_code(code),
        }
    }

    #[tokio::test]
    async fn prefixes_output_per_stream_and_finishes() {
        let h = harness(&["a"], 1);
        send_all(
            &h.tx,
            vec![
                data(0, b"hello\nwor"),
                data(1, b"oops\n"),
                data(0, b"ld"),
                closed(0),
                exited(0, 0),
                closed(1),
            ],
        )
        .await;

        let summary = h.controller.run().await.unwrap();

        assert!(summary.success());
        assert_eq!(h.stdout.text(), "a: hello\na: world");
        assert_eq!(h.stderr.text(), "a: oops\n");
    }

    #[tokio::test]
    async fn job_exit_frees_slot_before_streams_drain() {
        let h = harness(&["a", "b", "c"], 1);
        send_all(
            &h.tx,
            vec![
                exited(0, 0),
                exited(1, 2),
                data(0, b"late\n"),
                closed(0),
                closed(1),
                closed(2),
                closed(3),
                exited(2, 0),
                closed(4),
                closed(5),
            ],
        )
        .await;

        let summary = h.controller.run().await.unwrap();

        let launched = h.launched.lock().unwrap().clone();
        assert_eq!(
            launched,
            vec![
                ("a".to_string(), 0),
                ("b".to_string(), 2),
                ("c".to_string(), 4),
            ]
        );
        assert_eq!(h.stdout.text(), "a: late\n");
        assert_eq!(summary.failed, vec![("b".to_string(), 2)]);
        assert!(!summary.success());
    }

    #[tokio::test]
    async fn waits_for_streams_after_last_exit() {
        let h = harness(&["a"], 1);
        // Exit arrives first; the run must still consume the trailing output.
        send_all(&h.tx, vec![exited(0, 0), data(1, b"tail"), closed(1), closed(0)]).await;

        h.controller.run().await.unwrap();
        assert_eq!(h.stderr.text(), "a: tail");
    }

    #[tokio::test]
    async fn stray_events_are_ignored() {
        let h = harness(&["a"], 1);
        send_all(
            &h.tx,
            vec![closed(0), data(0, b"ghost\n"), closed(0), exited(0, 0), exited(0, 1), closed(1)],
        )
        .await;

        let summary = h.controller.run().await.unwrap();
        assert!(summary.success());
        assert!(h.stdout.text().is_empty());
    }

    #[tokio::test]
    async fn read_failure_is_fatal() {
        let h = harness(&["repo"], 1);
        send_all(
            &h.tx,
            vec![MuxEvent::ReadFailed {
                piper: PiperId(1),
                error: io::Error::other("boom"),
            }],
        )
        .await;

        let err = h.controller.run().await.unwrap_err();
        match err {
            WithinError::Read {
                directory, stream, ..
            } => {
                assert_eq!(directory, "repo");
                assert_eq!(stream, StreamKind::Stderr);
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fork_failure_stops_launching_and_aborts() {
        let (_tx, mux) = Multiplexer::channel();
        let launcher = ManualLauncher {
            fork_fails_at: Some(1),
            ..ManualLauncher::default()
        };
        let launched = launcher.launched.clone();
        let scheduler = Scheduler::new(
            ["a", "b", "c"].map(String::from),
            NonZeroUsize::new(3).unwrap(),
        );
        let controller = Controller::new(
            scheduler,
            mux,
            launcher,
            Sinks::new(CaptureBuffer::new(), CaptureBuffer::new()),
        );

        let err = controller.run().await.unwrap_err();

        assert!(matches!(err, WithinError::Fork(_)));
        assert!(err.to_string().starts_with("fork: "));
        let dirs: Vec<String> = launched.lock().unwrap().iter().map(|(d, _)| d.clone()).collect();
        assert_eq!(dirs, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn reap_failure_names_the_directory() {
        let h = harness(&["a", "repo"], 2);
        send_all(
            &h.tx,
            vec![MuxEvent::ReapFailed {
                job: JobId(1),
                error: io::Error::other("no child"),
            }],
        )
        .await;

        let err = h.controller.run().await.unwrap_err();
        match err {
            WithinError::Reap { directory, .. } => assert_eq!(directory, "repo"),
            other => panic!("expected reap error, got {other:?}"),
        }
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn write_failure_is_fatal() {
        let (tx, mux) = Multiplexer::channel();
        let scheduler = Scheduler::new(["a".to_string()], NonZeroUsize::MIN);
        let controller = Controller::new(
            scheduler,
            mux,
            ManualLauncher::default(),
            Sinks::new(BrokenSink, CaptureBuffer::new()),
        );
        tx.send(data(0, b"x\n")).await.unwrap();

        let err = controller.run().await.unwrap_err();
        assert!(matches!(
            err,
            WithinError::Write {
                stream: StreamKind::Stdout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn closed_event_stream_with_outstanding_work_is_an_error() {
        let h = harness(&["a"], 1);
        drop(h.tx);

        let err = h.controller.run().await.unwrap_err();
        assert!(matches!(err, WithinError::EventStreamClosed));
    }
}
