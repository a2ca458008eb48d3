// src/engine/scheduler.rs

//! Pure job scheduler.
//!
//! The scheduler decides *which* directory runs next and *whether* there is a
//! free slot for it; it never touches processes, pipes or tokio. The
//! controller asks it for launch requests and reports exits back.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::process::ExitCode;

use tracing::{debug, warn};

use crate::types::{JobId, JobOutcome, RunPlan};

/// A directory the scheduler has committed a concurrency slot to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub job: JobId,
    pub directory: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Exited(JobOutcome),
}

#[derive(Debug)]
struct JobRecord {
    directory: String,
    state: JobState,
}

#[derive(Debug)]
pub struct Scheduler {
    jobs: Vec<JobRecord>,
    /// Jobs not yet launched, in directory-list order.
    pending: VecDeque<JobId>,
    max_jobs: NonZeroUsize,
    active: usize,
    /// Sticky: once a job fails the run as a whole has failed.
    aggregate_failure: bool,
}

impl Scheduler {
    pub fn new<I>(directories: I, max_jobs: NonZeroUsize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let jobs: Vec<JobRecord> = directories
            .into_iter()
            .map(|directory| JobRecord {
                directory,
                state: JobState::Pending,
            })
            .collect();
        let pending = (0..jobs.len()).map(JobId).collect();

        Self {
            jobs,
            pending,
            max_jobs,
            active: 0,
            aggregate_failure: false,
        }
    }

    pub fn from_plan(plan: &RunPlan) -> Self {
        Self::new(plan.directories.iter().cloned(), plan.max_jobs)
    }

    /// Claim a slot for the next pending directory, if both exist.
    ///
    /// Calling this in a loop until it returns `None` fills every free slot.
    pub fn next_launch(&mut self) -> Option<LaunchRequest> {
        if self.active >= self.max_jobs.get() {
            return None;
        }
        let job = self.pending.pop_front()?;
        let record = &mut self.jobs[job.0];
        record.state = JobState::Running;
        self.active += 1;

        debug_assert!(self.active <= self.max_jobs.get());
        Some(LaunchRequest {
            job,
            directory: record.directory.clone(),
        })
    }

    /// Record a job's exit and free its slot.
    ///
    /// Returns `false` (and changes nothing) if the job is unknown, was never
    /// launched, or already has an outcome.
    pub fn on_job_exit(&mut self, job: JobId, outcome: JobOutcome) -> bool {
        let Some(record) = self.jobs.get_mut(job.0) else {
            warn!(%job, "exit reported for unknown job; ignoring");
            return false;
        };

        match record.state {
            JobState::Running => {}
            state => {
                warn!(%job, dir = %record.directory, ?state, "unexpected exit report; ignoring");
                return false;
            }
        }

        record.state = JobState::Exited(outcome);
        self.active -= 1;
        if !outcome.is_success() {
            self.aggregate_failure = true;
        }

        debug!(
            %job,
            dir = %record.directory,
            exit_code = outcome.code(),
            active = self.active,
            pending = self.pending.len(),
            "job exited"
        );
        true
    }

    pub fn directory_of(&self, job: JobId) -> Option<&str> {
        self.jobs.get(job.0).map(|r| r.directory.as_str())
    }

    pub fn state_of(&self, job: JobId) -> Option<JobState> {
        self.jobs.get(job.0).map(|r| r.state)
    }

    pub fn active_jobs(&self) -> usize {
        self.active
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    pub fn max_jobs(&self) -> NonZeroUsize {
        self.max_jobs
    }

    pub fn aggregate_failure(&self) -> bool {
        self.aggregate_failure
    }

    /// No job running and none left to start. Open streams are the
    /// controller's business, not the scheduler's.
    pub fn is_drained(&self) -> bool {
        self.active == 0 && self.pending.is_empty()
    }

    pub fn summary(&self) -> RunSummary {
        let failed = self
            .jobs
            .iter()
            .filter_map(|r| match r.state {
                JobState::Exited(JobOutcome::Failed(code)) => Some((r.directory.clone(), code)),
                _ => None,
            })
            .collect();

        RunSummary {
            total_jobs: self.jobs.len(),
            failed,
            aggregate_failure: self.aggregate_failure,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total_jobs: usize,
    /// Failed directories with their exit codes, in directory-list order.
    pub failed: Vec<(String, i32)>,
    pub aggregate_failure: bool,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        !self.aggregate_failure
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.aggregate_failure {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}
