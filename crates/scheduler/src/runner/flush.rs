use tracing::{debug, trace, warn};

use crate::clock::Millis;
use crate::priority::PriorityLevel;
use crate::task::{TaskId, TaskStep};

use super::core::Inner;
use super::Scheduler;

impl Scheduler {
    /// Run queued tasks for one time slice starting at `slice_start`.
    ///
    /// Returns true if work remains. On every exit path, including a task
    /// callback panicking, the current task is cleared and the current
    /// priority level is restored to its value before the flush.
    ///
    /// Calling `flush` from inside a task callback is refused: the outer
    /// flush keeps draining the queue, so this returns true without running
    /// anything.
    pub fn flush(&self, slice_start: Millis) -> bool {
        let inner = &self.inner;
        if inner.flushing.get() {
            warn!("flush called from inside a running task, ignoring");
            return true;
        }

        let mut budget = inner.budget.get();
        budget.start_slice(slice_start);
        inner.budget.set(budget);
        inner.metrics.borrow_mut().record_flush();

        let _cleanup = FlushScope::enter(inner);
        let has_more = self.work_loop();
        if has_more {
            inner.metrics.borrow_mut().yields += 1;
        }
        trace!(has_more, pending = inner.queue.borrow().len(), "flush finished");
        has_more
    }

    /// Drain the queue in `(expiration_time, id)` order until it is empty,
    /// the slice runs out, or a task yields with a continuation.
    fn work_loop(&self) -> bool {
        let inner = &self.inner;
        loop {
            let head = inner
                .queue
                .borrow()
                .peek_task()
                .map(|t| (t.id, t.expiration_time, t.priority, t.callback.is_some()));
            let Some((id, expiration_time, priority, has_callback)) = head else {
                return false;
            };
            inner.current_task.set(Some(id));

            // Overdue tasks run regardless of the remaining slice.
            if expiration_time > self.now() && self.should_yield() {
                break;
            }

            if !has_callback {
                self.discard_head();
                continue;
            }

            let callback = inner
                .queue
                .borrow_mut()
                .get_mut(id)
                .and_then(|task| task.callback.take());
            let Some(callback) = callback else {
                continue;
            };

            inner.current_priority.set(priority);
            let started = self.now();
            let did_timeout = expiration_time <= started;
            if did_timeout {
                inner.metrics.borrow_mut().timed_out_steps += 1;
            }
            debug!(task_id = id.get(), ?priority, did_timeout, "running task");

            let result = callback(did_timeout);
            self.note_slow_step(id, started);

            match result {
                Ok(TaskStep::Continue(next)) => {
                    let rejected = {
                        let mut queue = inner.queue.borrow_mut();
                        match queue.get_mut(id) {
                            Some(task) if task.is_live() => {
                                task.callback = Some(next);
                                None
                            }
                            _ => Some(next),
                        }
                    };
                    match rejected {
                        None => {
                            inner.metrics.borrow_mut().continuations += 1;
                            trace!(task_id = id.get(), "task yielded a continuation");
                            return true;
                        }
                        Some(next) => {
                            drop(next);
                            debug!(task_id = id.get(), "continuation dropped, task was cancelled");
                            self.retire(id);
                        }
                    }
                }
                Ok(TaskStep::Done) => {
                    inner.metrics.borrow_mut().record_completion(priority);
                    self.retire(id);
                }
                Err(err) => {
                    warn!(task_id = id.get(), ?priority, error = %err, "task failed");
                    inner.metrics.borrow_mut().tasks_failed += 1;
                    self.retire(id);
                }
            }
        }

        !inner.queue.borrow().is_empty()
    }

    /// Remove a finished task if it is still at the head. If re-entrant
    /// enqueues pushed it down, it is marked finished and discarded when
    /// the heap reaches it.
    fn retire(&self, id: TaskId) {
        let mut queue = self.inner.queue.borrow_mut();
        if queue.peek() == Some(id) {
            let finished = queue.pop();
            drop(queue);
            drop(finished);
        } else if let Some(task) = queue.get_mut(id) {
            let leftover = task.finish();
            drop(queue);
            drop(leftover);
        }
    }

    /// Pop a head task that has no callback (cancelled, or already run).
    fn discard_head(&self) {
        let discarded = self.inner.queue.borrow_mut().pop();
        if let Some(task) = discarded {
            if task.cancelled {
                self.inner.metrics.borrow_mut().tasks_discarded += 1;
                debug!(task_id = task.id.get(), "cancelled task discarded");
            }
        }
    }

    fn note_slow_step(&self, id: TaskId, started: Millis) {
        let threshold = self.inner.config.slow_task_warn_ms;
        let elapsed = self.now().saturating_sub(started);
        if threshold > 0 && elapsed >= threshold {
            warn!(task_id = id.get(), elapsed_ms = elapsed, "slow task step");
        }
    }
}

/// Marks the flush loop active and guarantees cleanup when it exits.
struct FlushScope<'a> {
    inner: &'a Inner,
    previous_priority: PriorityLevel,
}

impl<'a> FlushScope<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.flushing.set(true);
        Self {
            inner,
            previous_priority: inner.current_priority.get(),
        }
    }
}

impl Drop for FlushScope<'_> {
    fn drop(&mut self) {
        // A panicking task never runs again.
        if std::thread::panicking() {
            if let Some(id) = self.inner.current_task.get() {
                if let Ok(mut queue) = self.inner.queue.try_borrow_mut() {
                    if let Some(task) = queue.get_mut(id) {
                        task.finish();
                    }
                }
            }
        }
        self.inner.current_task.set(None);
        self.inner.current_priority.set(self.previous_priority);
        self.inner.flushing.set(false);
    }
}
