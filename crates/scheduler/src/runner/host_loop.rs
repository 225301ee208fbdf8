use tracing::{debug, warn};

use super::Scheduler;

impl Scheduler {
    /// Start the host loop unless a host callback is already outstanding.
    ///
    /// Enqueues from inside a running task land here too; the guard keeps
    /// them from requesting a second, overlapping callback.
    pub(super) fn request_host_loop(&self) {
        if self.inner.loop_running.replace(true) {
            return;
        }
        debug!("host loop started");
        self.schedule_host_callback();
    }

    /// Ask the host to run one slice later. The pending callback holds only
    /// a weak handle tagged with the current generation: it does nothing
    /// once the scheduler is freed or after `shutdown`. Callbacks holding a
    /// strong `Scheduler` keep it alive until `shutdown`.
    fn schedule_host_callback(&self) {
        let weak = self.downgrade();
        let generation = self.inner.generation.get();
        self.inner.host.request_callback(Box::new(move || {
            let Some(scheduler) = weak.upgrade() else {
                return;
            };
            if scheduler.inner.generation.get() == generation {
                scheduler.run_slice();
            } else {
                debug!("stale host callback ignored");
            }
        }));
    }

    /// Host callback body: one slice of work, then reschedule or go idle.
    fn run_slice(&self) {
        let generation = self.inner.generation.get();
        let mut guard = SliceGuard {
            scheduler: self,
            generation,
            completed: false,
        };
        let has_more = self.flush(self.now());
        guard.completed = true;

        // A task called `shutdown`; the loop was already reset.
        if self.inner.generation.get() != generation {
            return;
        }
        if has_more {
            self.schedule_host_callback();
        } else {
            self.inner.loop_running.set(false);
            debug!("host loop idle");
        }
    }
}

/// Keeps the host loop consistent when a task panics out of `flush`:
/// re-arms the loop if work remains, otherwise marks it idle.
struct SliceGuard<'a> {
    scheduler: &'a Scheduler,
    generation: u64,
    completed: bool,
}

impl Drop for SliceGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.scheduler.inner;
        if self.completed || inner.generation.get() != self.generation {
            return;
        }
        let has_more = inner
            .queue
            .try_borrow()
            .map(|queue| !queue.is_empty())
            .unwrap_or(false);
        warn!(has_more, "flush aborted by a panicking task");
        if has_more {
            self.scheduler.schedule_host_callback();
        } else {
            inner.loop_running.set(false);
        }
    }
}
