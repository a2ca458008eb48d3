// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] defines the [`Launcher`] seam and the production
//!   [`ProcessLauncher`], which spawns `tokio::process` children with their
//!   stdout/stderr redirected into fresh pipes.
//! - [`pump`] holds the background tasks that read those pipes and wait for
//!   the children, reporting everything as multiplexer events.

pub mod launcher;
pub mod pump;

pub use launcher::{LAUNCH_FAILURE_CODE, Launcher, ProcessLauncher};
pub use pump::{spawn_reaper, spawn_stream_pump};
