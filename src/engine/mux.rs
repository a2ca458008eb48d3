// src/engine/mux.rs

//! The controller's single wait point.
//!
//! Every source of readiness (one pump task per child stream, one reaper
//! task per child) reports into one bounded channel. The controller blocks
//! only in [`Multiplexer::wait_next_event`], and the channel's FIFO order
//! is what keeps each stream's data ahead of its closure.

use std::io;

use tokio::sync::mpsc;
use tracing::trace;

use crate::types::{JobId, JobOutcome, PiperId};

/// Capacity of the event channel. Pumps wait when it is full, so a slow
/// controller slows the readers rather than buffering without bound.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A readiness event for the controller.
#[derive(Debug)]
pub enum MuxEvent {
    /// A child process terminated.
    JobExited { job: JobId, outcome: JobOutcome },
    /// Bytes read from a piper's source, in stream order.
    Data { piper: PiperId, chunk: Vec<u8> },
    /// The piper's source reached end-of-stream; no more `Data` follows.
    Closed { piper: PiperId },
    /// Reading the piper's source failed for a reason other than EOF.
    ReadFailed { piper: PiperId, error: io::Error },
    /// Waiting for the child's exit status failed.
    ReapFailed { job: JobId, error: io::Error },
}

/// Handle given to launchers, pumps and reapers to report events.
pub type EventSender = mpsc::Sender<MuxEvent>;

#[derive(Debug)]
pub struct Multiplexer {
    rx: mpsc::Receiver<MuxEvent>,
}

impl Multiplexer {
    /// Create a multiplexer and the sender feeding it.
    pub fn channel() -> (EventSender, Self) {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Block until the next child exit or stream event.
    ///
    /// Returns `None` only once every sender has been dropped.
    pub async fn wait_next_event(&mut self) -> Option<MuxEvent> {
        let event = self.rx.recv().await;
        if let Some(ref event) = event {
            trace!(?event, "multiplexer event");
        }
        event
    }
}
