// src/engine/mod.rs

//! Orchestration engine for within.
//!
//! - [`scheduler`]: pure state machine deciding which directory runs next
//!   and aggregating exit statuses. No IO, fully unit-testable.
//! - [`mux`]: the multiplexer, i.e. the single channel all readiness events
//!   (child exits, stream data, stream closure) flow through.
//! - [`controller`]: the event loop that owns the scheduler, the piper
//!   registry and the output sinks, and reacts to multiplexer events.

pub mod controller;
pub mod mux;
pub mod scheduler;

pub use controller::Controller;
pub use mux::{EventSender, MuxEvent, Multiplexer};
pub use scheduler::{JobState, LaunchRequest, RunSummary, Scheduler};
