use std::num::NonZeroUsize;

use within::engine::Scheduler;
use within::types::RunPlan;

/// Builder for `RunPlan` to simplify test setup.
///
/// Defaults to one job at a time running `true`.
pub struct RunPlanBuilder {
    max_jobs: usize,
    directories: Vec<String>,
    command: Vec<String>,
}

impl RunPlanBuilder {
    pub fn new() -> Self {
        Self {
            max_jobs: 1,
            directories: vec![],
            command: vec!["true".to_string()],
        }
    }

    pub fn jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn dir(mut self, directory: impl Into<String>) -> Self {
        self.directories.push(directory.into());
        self
    }

    pub fn dirs<I, S>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directories.extend(directories.into_iter().map(Into::into));
        self
    }

    pub fn command<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> RunPlan {
        let max_jobs = NonZeroUsize::new(self.max_jobs).expect("max_jobs must be at least 1");
        RunPlan::new(max_jobs, self.directories, self.command)
            .expect("Failed to build valid plan from builder")
    }

    pub fn scheduler(self) -> Scheduler {
        Scheduler::from_plan(&self.build())
    }
}

impl Default for RunPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}
