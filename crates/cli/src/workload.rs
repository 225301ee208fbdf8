//! Synthetic workload: root tasks of mixed priority that split their work
//! into continuation steps whenever the scheduler asks them to yield.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use cadence_scheduler::{
    PriorityLevel, Scheduler, TaskHandle, TaskResult, TaskStep, WeakScheduler,
};
use tracing::debug;

/// Shape of the generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadPlan {
    pub tasks: usize,
    pub units: u32,
    pub unit: Duration,
    pub cancel_every: usize,
    pub seed: u64,
}

/// Counters filled in as the workload runs.
#[derive(Debug, Default)]
pub struct WorkloadStats {
    pub units_done: Cell<u64>,
    pub tasks_finished: Cell<u64>,
    pub follow_ups: Cell<u64>,
}

/// Deterministic priority mix from a 64-bit LCG.
struct PriorityMix(u64);

impl PriorityMix {
    fn next_priority(&mut self) -> PriorityLevel {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        PriorityLevel::from_code((self.0 >> 33) as u8 % 5 + 1)
    }
}

/// Enqueue the workload and cancel every `cancel_every`-th root task.
/// Returns the handles of the cancelled tasks.
pub fn enqueue(
    scheduler: &Scheduler,
    plan: &WorkloadPlan,
    stats: &Rc<WorkloadStats>,
) -> Vec<TaskHandle> {
    let mut mix = PriorityMix(plan.seed);
    let mut cancelled = Vec::new();

    for index in 0..plan.tasks {
        let priority = mix.next_priority();
        let (s, st, unit, units) = (scheduler.downgrade(), stats.clone(), plan.unit, plan.units);
        let handle = scheduler.enqueue(priority, move |did_timeout| {
            resume(s, st, unit, units, true, did_timeout)
        });
        if plan.cancel_every > 0 && index % plan.cancel_every == plan.cancel_every - 1 {
            scheduler.cancel(handle);
            cancelled.push(handle);
        }
    }

    debug!(tasks = plan.tasks, cancelled = cancelled.len(), "workload enqueued");
    cancelled
}

/// Tasks hold weak handles so queued work never keeps the scheduler alive.
fn resume(
    scheduler: WeakScheduler,
    stats: Rc<WorkloadStats>,
    unit: Duration,
    remaining: u32,
    root: bool,
    did_timeout: bool,
) -> TaskResult {
    match scheduler.upgrade() {
        Some(scheduler) => run_units(scheduler, stats, unit, remaining, root, did_timeout),
        None => Ok(TaskStep::Done),
    }
}

/// One step of a task: work through `remaining` units, yielding with a
/// continuation when the slice runs out. Root tasks enqueue one follow-up
/// at the current priority when they finish.
fn run_units(
    scheduler: Scheduler,
    stats: Rc<WorkloadStats>,
    unit: Duration,
    remaining: u32,
    root: bool,
    did_timeout: bool,
) -> TaskResult {
    let mut remaining = remaining;
    // Overdue work finishes in one go instead of yielding.
    while remaining > 0 && (did_timeout || !scheduler.should_yield()) {
        spin(unit);
        remaining -= 1;
        stats.units_done.set(stats.units_done.get() + 1);
    }

    if remaining > 0 {
        let s = scheduler.downgrade();
        return Ok(TaskStep::continue_with(move |did_timeout| {
            resume(s, stats, unit, remaining, root, did_timeout)
        }));
    }

    stats.tasks_finished.set(stats.tasks_finished.get() + 1);
    if root {
        stats.follow_ups.set(stats.follow_ups.get() + 1);
        let s = scheduler.downgrade();
        scheduler.enqueue_current(move |did_timeout| {
            resume(s, stats, unit, 1, false, did_timeout)
        });
    }
    Ok(TaskStep::Done)
}

fn spin(unit: Duration) {
    let start = Instant::now();
    while start.elapsed() < unit {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use cadence_scheduler::{ManualClock, ManualHost, SchedulerConfig};

    use super::*;

    fn plan_of(tasks: usize, cancel_every: usize) -> WorkloadPlan {
        WorkloadPlan {
            tasks,
            units: 3,
            unit: Duration::ZERO,
            cancel_every,
            seed: 1,
        }
    }

    #[test]
    fn priority_mix_is_deterministic() {
        let a: Vec<_> = {
            let mut mix = PriorityMix(9);
            (0..16).map(|_| mix.next_priority()).collect()
        };
        let b: Vec<_> = {
            let mut mix = PriorityMix(9);
            (0..16).map(|_| mix.next_priority()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn workload_runs_to_completion() {
        let host = ManualHost::new();
        let scheduler =
            Scheduler::new(SchedulerConfig::default(), ManualClock::new(0), host.clone()).unwrap();
        let stats = Rc::new(WorkloadStats::default());

        let cancelled = enqueue(&scheduler, &plan_of(10, 4), &stats);
        assert_eq!(cancelled.len(), 2);
        host.run_until_idle(100);

        // 8 roots plus 8 follow-ups; cancelled roots never spawn follow-ups.
        assert_eq!(stats.tasks_finished.get(), 16);
        assert_eq!(stats.follow_ups.get(), 8);
        assert_eq!(stats.units_done.get(), 8 * 3 + 8);
        assert!(cancelled.iter().all(|h| !scheduler.is_pending(*h)));
        assert_eq!(scheduler.pending_count(), 0);
    }
}
