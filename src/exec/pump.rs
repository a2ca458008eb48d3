// src/exec/pump.rs

//! Background tasks that turn child streams and child exits into
//! [`MuxEvent`]s.
//!
//! A pump owns one readable source until end-of-stream and forwards every
//! read as a `Data` event, then exactly one `Closed` (or `ReadFailed`). A
//! reaper owns one child handle until its exit status is collected.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tracing::{debug, trace};

use crate::engine::mux::{EventSender, MuxEvent};
use crate::types::{JobId, JobOutcome, PiperId};

/// Upper bound on the bytes carried by a single `Data` event.
pub const PUMP_CHUNK_SIZE: usize = 8 * 1024;

/// Spawn a pump for `source` on the current runtime.
pub fn spawn_stream_pump<R>(piper: PiperId, source: R, events: EventSender)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(pump_stream(piper, source, events));
}

/// Forward `source` to the controller until it is exhausted.
pub async fn pump_stream<R>(piper: PiperId, mut source: R, events: EventSender)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PUMP_CHUNK_SIZE];

    loop {
        let event = match source.read(&mut buf).await {
            Ok(0) => {
                trace!(%piper, "end of stream");
                MuxEvent::Closed { piper }
            }
            Ok(n) => MuxEvent::Data {
                piper,
                chunk: buf[..n].to_vec(),
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => MuxEvent::ReadFailed { piper, error },
        };

        let last = !matches!(event, MuxEvent::Data { .. });
        if events.send(event).await.is_err() {
            debug!(%piper, "controller gone; stopping pump");
            return;
        }
        if last {
            return;
        }
    }
}

/// Spawn a task that waits for `child` and reports its exit.
pub fn spawn_reaper(job: JobId, mut child: Child, events: EventSender) {
    tokio::spawn(async move {
        let event = match child.wait().await {
            Ok(status) => MuxEvent::JobExited {
                job,
                outcome: JobOutcome::from_exit_status(status),
            },
            Err(error) => MuxEvent::ReapFailed { job, error },
        };

        if events.send(event).await.is_err() {
            debug!(%job, "controller gone; dropping exit status");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncWriteExt, ReadBuf};
    use tokio::process::Command;

    use super::*;
    use crate::engine::mux::Multiplexer;

    async fn collect(mux: &mut Multiplexer) -> Vec<MuxEvent> {
        let mut events = Vec::new();
        while let Some(event) = mux.wait_next_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn pump_forwards_bytes_then_closes() {
        let (tx, mut mux) = Multiplexer::channel();
        let (mut writer, reader) = tokio::io::duplex(16);

        spawn_stream_pump(PiperId(1), reader, tx);
        writer.write_all(b"hello\nworld").await.unwrap();
        drop(writer);

        let events = collect(&mut mux).await;
        let (data, rest) = events.split_at(events.len() - 1);

        let bytes: Vec<u8> = data
            .iter()
            .flat_map(|e| match e {
                MuxEvent::Data { piper: PiperId(1), chunk } => chunk.clone(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(bytes, b"hello\nworld");
        assert!(matches!(rest[0], MuxEvent::Closed { piper: PiperId(1) }));
    }

    struct BrokenSource;

    impl AsyncRead for BrokenSource {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("device gone")))
        }
    }

    #[tokio::test]
    async fn pump_reports_read_failure_once() {
        let (tx, mut mux) = Multiplexer::channel();
        spawn_stream_pump(PiperId(2), BrokenSource, tx);

        let events = collect(&mut mux).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MuxEvent::ReadFailed { piper: PiperId(2), .. }));
    }

    #[tokio::test]
    async fn reaper_reports_exit_code() {
        let (tx, mut mux) = Multiplexer::channel();
        let child = Command::new("sh").arg("-c").arg("exit 3").spawn().unwrap();

        spawn_reaper(JobId(4), child, tx);

        let events = collect(&mut mux).await;
        assert!(matches!(
            events[..],
            [MuxEvent::JobExited { job: JobId(4), outcome: JobOutcome::Failed(3) }]
        ));
    }
}
