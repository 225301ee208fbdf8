//! Integration tests for the host loop on a tokio `LocalSet`.
//!
//! Verifies that slices are re-armed through `spawn_local`, and that other
//! host work gets turns between slices.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;
use tokio::time::timeout;

use cadence_scheduler::{
    LocalSetHost, MonotonicClock, PriorityLevel, Scheduler, SchedulerConfig, TaskStep,
};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn wait_until_idle(scheduler: &Scheduler) {
    while scheduler.is_loop_running() {
        tokio::task::yield_now().await;
    }
}

/// Host job that keeps re-spawning itself while the scheduler loop runs.
fn spawn_ticker(scheduler: Scheduler, ticks: Rc<Cell<u32>>) {
    tokio::task::spawn_local(async move {
        ticks.set(ticks.get() + 1);
        if scheduler.is_loop_running() {
            spawn_ticker(scheduler, ticks);
        }
    });
}

#[tokio::test]
async fn drains_queue_on_local_set() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let scheduler = Scheduler::new(
                SchedulerConfig::default(),
                MonotonicClock::new(),
                LocalSetHost::new(),
            )
            .unwrap();
            let done = Rc::new(Cell::new(0));

            for i in 0..100u8 {
                let done = done.clone();
                scheduler.enqueue(PriorityLevel::from_code(i % 6), move |_| {
                    done.set(done.get() + 1);
                    Ok(TaskStep::Done)
                });
            }
            assert_eq!(done.get(), 0, "enqueue never runs work synchronously");

            timeout(TIMEOUT, wait_until_idle(&scheduler)).await.unwrap();
            assert_eq!(done.get(), 100);
            assert_eq!(scheduler.pending_count(), 0);
        })
        .await;
}

#[tokio::test]
async fn host_work_interleaves_between_slices() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let config = SchedulerConfig {
                frame_interval_ms: 5,
                ..SchedulerConfig::default()
            };
            let scheduler =
                Scheduler::new(config, MonotonicClock::new(), LocalSetHost::new()).unwrap();
            let ticks = Rc::new(Cell::new(0));
            let observed = Rc::new(RefCell::new(Vec::new()));

            for _ in 0..10 {
                let (ticks, observed) = (ticks.clone(), observed.clone());
                scheduler.enqueue(PriorityLevel::Normal, move |_| {
                    std::thread::sleep(Duration::from_millis(2));
                    observed.borrow_mut().push(ticks.get());
                    Ok(TaskStep::Done)
                });
            }
            spawn_ticker(scheduler.clone(), ticks.clone());

            timeout(TIMEOUT, wait_until_idle(&scheduler)).await.unwrap();

            let observed = observed.borrow();
            assert_eq!(observed.len(), 10);
            assert!(
                observed.last() > observed.first(),
                "host ticker should run between slices: {observed:?}"
            );
            assert!(scheduler.metrics().yields >= 1);
        })
        .await;
}

#[tokio::test]
async fn continuation_resumes_on_later_slice() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let scheduler = Scheduler::new(
                SchedulerConfig::default(),
                MonotonicClock::new(),
                LocalSetHost::new(),
            )
            .unwrap();
            let steps = Rc::new(Cell::new(0));

            fn step(steps: Rc<Cell<u32>>) -> cadence_scheduler::TaskResult {
                steps.set(steps.get() + 1);
                if steps.get() < 4 {
                    Ok(TaskStep::continue_with(move |_| step(steps)))
                } else {
                    Ok(TaskStep::Done)
                }
            }

            let s = steps.clone();
            scheduler.enqueue(PriorityLevel::UserBlocking, move |_| step(s));

            timeout(TIMEOUT, wait_until_idle(&scheduler)).await.unwrap();
            assert_eq!(steps.get(), 4);
            let metrics = scheduler.metrics();
            assert_eq!(metrics.continuations, 3);
            assert_eq!(metrics.flushes, 4);
        })
        .await;
}
