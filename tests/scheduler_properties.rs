// tests/scheduler_properties.rs

use std::num::NonZeroUsize;

use proptest::prelude::*;
use within::engine::Scheduler;
use within::types::{JobId, JobOutcome};

// A run: number of directories, slot count, and for each exit a choice of
// which running job finishes plus its exit code.
fn run_strategy() -> impl Strategy<Value = (usize, usize, Vec<(usize, i32)>)> {
    (1usize..20, 1usize..6).prop_flat_map(|(dirs, slots)| {
        let exits = proptest::collection::vec((any::<usize>(), 0i32..3), dirs);
        (Just(dirs), Just(slots), exits)
    })
}

fn fill(scheduler: &mut Scheduler, running: &mut Vec<JobId>, launched: &mut Vec<String>) {
    while let Some(req) = scheduler.next_launch() {
        running.push(req.job);
        launched.push(req.directory);
    }
}

proptest! {
    #[test]
    fn launches_in_order_within_limit((dirs, slots, exits) in run_strategy()) {
        let names: Vec<String> = (0..dirs).map(|i| format!("dir{i}")).collect();
        let mut scheduler = Scheduler::new(names.clone(), NonZeroUsize::new(slots).unwrap());

        let mut launched = Vec::new();
        let mut running: Vec<JobId> = Vec::new();
        let mut any_failed = false;

        fill(&mut scheduler, &mut running, &mut launched);
        for (pick, code) in exits {
            prop_assert!(scheduler.active_jobs() <= slots);
            prop_assert_eq!(scheduler.active_jobs(), running.len());
            prop_assert!(!running.is_empty());

            // A full slot set stays full while work is pending.
            if scheduler.pending_jobs() > 0 {
                prop_assert_eq!(scheduler.active_jobs(), slots);
            }

            let job = running.remove(pick % running.len());
            any_failed |= code != 0;
            prop_assert!(scheduler.on_job_exit(job, JobOutcome::from_code(code)));
            // A second report for the same job changes nothing.
            prop_assert!(!scheduler.on_job_exit(job, JobOutcome::from_code(0)));

            fill(&mut scheduler, &mut running, &mut launched);
        }

        prop_assert!(scheduler.is_drained());
        prop_assert_eq!(launched, names);

        let summary = scheduler.summary();
        prop_assert_eq!(summary.total_jobs, dirs);
        prop_assert_eq!(summary.success(), !any_failed);
        prop_assert_eq!(scheduler.aggregate_failure(), any_failed);
    }
}
