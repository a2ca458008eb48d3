use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::watch;
use tracing::debug;
use within::engine::{EventSender, LaunchRequest, MuxEvent};
use within::errors::Result;
use within::exec::{Launcher, spawn_stream_pump};
use within::piper::{Piper, PiperRegistry};
use within::types::{JobId, JobOutcome, StreamKind};

const FAKE_PIPE_CAPACITY: usize = 64 * 1024;

/// What a fake child writes and how it exits.
#[derive(Debug, Clone, Default)]
pub struct ScriptedJob {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// Keep both streams open after exiting until
    /// [`FakeLauncherHandle::release_streams`] is called, like a background
    /// grandchild that inherited the pipes.
    pub hold_streams: bool,
}

impl ScriptedJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.stdout = bytes.as_ref().to_vec();
        self
    }

    pub fn stderr(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.stderr = bytes.as_ref().to_vec();
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn hold_streams(mut self) -> Self {
        self.hold_streams = true;
        self
    }
}

/// A fake launcher that:
/// - registers the two pipers a real launch would
/// - feeds scripted bytes through in-memory pipes and the real stream pumps
/// - reports the scripted exit status
/// - records launch order and how many jobs were alive at once.
///
/// Directories without a script behave like `true`.
pub struct FakeLauncher {
    events: EventSender,
    scripts: HashMap<String, ScriptedJob>,
    handle: FakeLauncherHandle,
}

/// Shared view of a [`FakeLauncher`] that stays usable after the launcher
/// has been moved into a controller.
#[derive(Clone)]
pub struct FakeLauncherHandle {
    launched: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    release: Arc<watch::Sender<bool>>,
}

impl FakeLauncher {
    pub fn new(events: EventSender) -> Self {
        let (release, _) = watch::channel(false);
        Self {
            events,
            scripts: HashMap::new(),
            handle: FakeLauncherHandle {
                launched: Arc::new(Mutex::new(Vec::new())),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                release: Arc::new(release),
            },
        }
    }

    pub fn script(mut self, directory: impl Into<String>, job: ScriptedJob) -> Self {
        self.scripts.insert(directory.into(), job);
        self
    }

    pub fn handle(&self) -> FakeLauncherHandle {
        self.handle.clone()
    }
}

impl FakeLauncherHandle {
    /// Directories in the order they were launched.
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    /// Highest number of jobs that were alive at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Let every job created with `hold_streams` close its streams.
    pub fn release_streams(&self) {
        self.release.send_replace(true);
    }
}

impl Launcher for FakeLauncher {
    fn spawn(&mut self, request: &LaunchRequest, registry: &mut PiperRegistry) -> Result<()> {
        let script = self
            .scripts
            .get(&request.directory)
            .cloned()
            .unwrap_or_default();

        self.handle
            .launched
            .lock()
            .unwrap()
            .push(request.directory.clone());
        let alive = self.handle.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.handle.peak.fetch_max(alive, Ordering::SeqCst);

        let stdout_id = registry.add(Piper::new(request.job, StreamKind::Stdout, &request.directory));
        let stderr_id = registry.add(Piper::new(request.job, StreamKind::Stderr, &request.directory));

        let (stdout_child, stdout_parent) = tokio::io::duplex(FAKE_PIPE_CAPACITY);
        let (stderr_child, stderr_parent) = tokio::io::duplex(FAKE_PIPE_CAPACITY);
        spawn_stream_pump(stdout_id, stdout_parent, self.events.clone());
        spawn_stream_pump(stderr_id, stderr_parent, self.events.clone());

        let events = self.events.clone();
        let in_flight = Arc::clone(&self.handle.in_flight);
        let release = self.handle.release.subscribe();
        let job = request.job;

        tokio::spawn(async move {
            let played = play_script(
                script,
                stdout_child,
                stderr_child,
                job,
                events,
                in_flight,
                release,
            )
            .await;
            if let Err(e) = played {
                debug!(%job, error = %e, "fake job stopped early");
            }
        });

        Ok(())
    }
}

/// Act out one scripted child: write its output, exit, and keep the streams
/// open until released if asked to.
async fn play_script(
    script: ScriptedJob,
    mut out: DuplexStream,
    mut err: DuplexStream,
    job: JobId,
    events: EventSender,
    in_flight: Arc<AtomicUsize>,
    mut release: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    out.write_all(&script.stdout).await?;
    err.write_all(&script.stderr).await?;

    in_flight.fetch_sub(1, Ordering::SeqCst);
    events
        .send(MuxEvent::JobExited {
            job,
            outcome: JobOutcome::from_code(script.exit_code),
        })
        .await
        .map_err(anyhow::Error::from)?;

    if script.hold_streams {
        release.wait_for(|released| *released).await?;
    }
    Ok(())
}
