// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod output;
pub mod piper;
pub mod types;

use std::num::NonZeroUsize;

use tracing::debug;

use crate::cli::Invocation;
use crate::config::ConfigFile;
use crate::engine::{Controller, Multiplexer, RunSummary, Scheduler};
use crate::errors::Result;
use crate::exec::ProcessLauncher;
use crate::output::Sinks;
use crate::types::RunPlan;

/// High-level entry point used by `main.rs`.
///
/// Resolves the plan from the command line and config, then runs every job
/// with output going to this process's stdout/stderr.
pub async fn run(invocation: &Invocation, settings: &ConfigFile) -> Result<RunSummary> {
    let plan = build_plan(invocation, settings)?;
    run_plan(plan, Sinks::stdio()).await
}

/// Combine command-line values with config defaults.
///
/// `-j` beats the config file's `jobs`, which beats 1.
pub fn build_plan(invocation: &Invocation, settings: &ConfigFile) -> Result<RunPlan> {
    let max_jobs = invocation
        .jobs
        .or(settings.jobs)
        .unwrap_or(NonZeroUsize::MIN);

    RunPlan::new(
        max_jobs,
        invocation.directories.clone(),
        invocation.command.clone(),
    )
}

/// Run `plan` with real child processes, writing prefixed output to `sinks`.
pub async fn run_plan(plan: RunPlan, sinks: Sinks) -> Result<RunSummary> {
    debug!(?plan, "resolved run plan");

    let (events, mux) = Multiplexer::channel();
    let launcher = ProcessLauncher::from_plan(&plan, events);
    let scheduler = Scheduler::from_plan(&plan);

    Controller::new(scheduler, mux, launcher, sinks).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(jobs: Option<usize>) -> Invocation {
        Invocation {
            jobs: jobs.and_then(NonZeroUsize::new),
            config: None,
            log_level: None,
            directories: vec!["a".into(), "b".into()],
            command: vec!["true".into()],
        }
    }

    #[test]
    fn jobs_flag_overrides_config() {
        let settings = ConfigFile {
            jobs: NonZeroUsize::new(4),
            log_level: None,
        };

        assert_eq!(build_plan(&invocation(Some(2)), &settings).unwrap().max_jobs.get(), 2);
        assert_eq!(build_plan(&invocation(None), &settings).unwrap().max_jobs.get(), 4);
        assert_eq!(
            build_plan(&invocation(None), &ConfigFile::default()).unwrap().max_jobs.get(),
            1
        );
    }
}
