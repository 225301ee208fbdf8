use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::clock::{Clock, Millis};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::frame::FrameBudget;
use crate::host::HostPort;
use crate::metrics::SchedulerMetrics;
use crate::priority::{PriorityLevel, expiration_time};
use crate::queue::TaskQueue;
use crate::task::{TaskHandle, TaskId, TaskRecord, TaskResult};

/// Shared scheduler state. Every field is borrowed only briefly and never
/// across a task callback, so callbacks may re-enter the scheduler.
pub(super) struct Inner {
    pub(super) config: SchedulerConfig,
    pub(super) clock: Rc<dyn Clock>,
    pub(super) host: Rc<dyn HostPort>,
    pub(super) queue: RefCell<TaskQueue>,
    pub(super) budget: Cell<FrameBudget>,
    /// Task presently executing, or the head being examined by the flush loop.
    pub(super) current_task: Cell<Option<TaskId>>,
    pub(super) current_priority: Cell<PriorityLevel>,
    /// Host loop guard: a deferred callback is pending or running.
    pub(super) loop_running: Cell<bool>,
    /// Flush guard: the flush loop is on the stack.
    pub(super) flushing: Cell<bool>,
    /// Bumped by `shutdown`; host callbacks from an older generation are stale.
    pub(super) generation: Cell<u64>,
    pub(super) next_id: Cell<u64>,
    pub(super) metrics: RefCell<SchedulerMetrics>,
}

/// Cooperative single-threaded scheduler.
///
/// A cheap, cloneable handle. All clones drive the same queue.
///
/// Queued callbacks that hold a strong `Scheduler` keep it alive through
/// the queue itself. Callbacks that enqueue follow-up work should capture
/// a [`WeakScheduler`] from [`Scheduler::downgrade`]; otherwise call
/// [`Scheduler::shutdown`] to release the queue.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Rc<Inner>,
}

/// Non-owning scheduler handle for task callbacks.
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<Inner>,
}

impl WeakScheduler {
    /// The scheduler, if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl std::fmt::Debug for WeakScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakScheduler")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler reading time from `clock` and yielding through `host`.
    pub fn new<C, H>(config: SchedulerConfig, clock: C, host: H) -> Result<Self, SchedulerError>
    where
        C: Clock + 'static,
        H: HostPort + 'static,
    {
        config.validate()?;
        let budget = FrameBudget::new(config.frame_interval_ms);
        Ok(Self {
            inner: Rc::new(Inner {
                config,
                clock: Rc::new(clock),
                host: Rc::new(host),
                queue: RefCell::new(TaskQueue::new()),
                budget: Cell::new(budget),
                current_task: Cell::new(None),
                current_priority: Cell::new(PriorityLevel::Normal),
                loop_running: Cell::new(false),
                flushing: Cell::new(false),
                generation: Cell::new(0),
                next_id: Cell::new(1),
                metrics: RefCell::new(SchedulerMetrics::default()),
            }),
        })
    }

    /// Enqueue a task. Its deadline is `now + timeout(priority)` and never
    /// changes afterwards. Starts the host loop if it is idle.
    pub fn enqueue<F>(&self, priority: PriorityLevel, callback: F) -> TaskHandle
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        let inner = &self.inner;
        let now = self.now();
        let expiration = expiration_time(now, priority);

        let id = TaskId(inner.next_id.get());
        inner.next_id.set(id.0 + 1);

        let task = TaskRecord::new(id, priority, now, expiration, Box::new(callback));
        inner.queue.borrow_mut().push(task);
        inner.metrics.borrow_mut().tasks_enqueued += 1;
        debug!(task_id = id.get(), ?priority, expiration_time = expiration, "task enqueued");

        self.request_host_loop();
        TaskHandle(id)
    }

    /// Enqueue at the current priority level.
    pub fn enqueue_current<F>(&self, callback: F) -> TaskHandle
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        self.enqueue(self.current_priority_level(), callback)
    }

    /// Cancel a pending task. The task keeps its queue slot and is discarded
    /// without running once it reaches the head. If it is mid-execution,
    /// any continuation it returns is dropped.
    ///
    /// Returns false if the task already finished or was cancelled.
    pub fn cancel(&self, handle: TaskHandle) -> bool {
        let detached = {
            let mut queue = self.inner.queue.borrow_mut();
            match queue.get_mut(handle.0) {
                Some(task) if task.is_live() => Some(task.cancel()),
                _ => None,
            }
        };
        match detached {
            Some(_callback) => {
                debug!(task_id = handle.0.get(), "task cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel whichever task is recorded as current.
    pub fn cancel_current(&self) -> bool {
        match self.inner.current_task.get() {
            Some(id) => self.cancel(TaskHandle(id)),
            None => false,
        }
    }

    /// Whether the task is still queued, not cancelled and not finished.
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.inner
            .queue
            .borrow()
            .get(handle.0)
            .is_some_and(|task| task.is_live())
    }

    /// A handle that does not keep the scheduler alive.
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Drop every queued task and return the host loop to idle. Host
    /// callbacks already handed to the host become no-ops. Returns how many
    /// queue slots were released.
    ///
    /// This also breaks reference cycles formed by callbacks holding a
    /// strong `Scheduler`.
    pub fn shutdown(&self) -> usize {
        let inner = &self.inner;
        let drained = std::mem::take(&mut *inner.queue.borrow_mut());
        let released = drained.len();
        inner.generation.set(inner.generation.get() + 1);
        inner.loop_running.set(false);
        // Callbacks may hold scheduler handles; drop them outside the borrow.
        drop(drained);
        debug!(released, "scheduler shut down");
        released
    }

    pub fn current_priority_level(&self) -> PriorityLevel {
        self.inner.current_priority.get()
    }

    /// The task currently recorded as executing.
    pub fn current_task(&self) -> Option<TaskHandle> {
        self.inner.current_task.get().map(TaskHandle)
    }

    /// Queue slots in use, including cancelled tasks not yet reclaimed.
    pub fn pending_count(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// The task at the head of the queue.
    pub fn first_pending(&self) -> Option<TaskHandle> {
        self.inner.queue.borrow().peek().map(TaskHandle)
    }

    /// Run `f` with the current priority level set to `priority`.
    pub fn run_with_priority<R>(&self, priority: PriorityLevel, f: impl FnOnce() -> R) -> R {
        let _restore = PriorityScope::enter(&self.inner, priority);
        f()
    }

    /// Run `f` at Normal priority, unless the current level is already
    /// less urgent than Normal.
    pub fn next<R>(&self, f: impl FnOnce() -> R) -> R {
        let priority = match self.current_priority_level() {
            PriorityLevel::Immediate | PriorityLevel::UserBlocking | PriorityLevel::Normal => {
                PriorityLevel::Normal
            }
            lower => lower,
        };
        self.run_with_priority(priority, f)
    }

    pub fn now(&self) -> Millis {
        self.inner.clock.now()
    }

    /// Whether the current slice has used up its frame interval.
    pub fn should_yield(&self) -> bool {
        self.inner.budget.get().should_yield(self.now())
    }

    pub fn frame_interval(&self) -> Millis {
        self.inner.budget.get().frame_interval()
    }

    /// Override the frame interval from a target frame rate (see
    /// [`FrameBudget::force_frame_rate`]).
    pub fn force_frame_rate(&self, fps: u32) -> Result<(), SchedulerError> {
        let mut budget = self.inner.budget.get();
        budget.force_frame_rate(fps)?;
        self.inner.budget.set(budget);
        debug!(fps, frame_interval_ms = budget.frame_interval(), "frame rate forced");
        Ok(())
    }

    /// Whether a host callback is pending or running.
    pub fn is_loop_running(&self) -> bool {
        self.inner.loop_running.get()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.inner.metrics.borrow().clone()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending_count())
            .field("current_task", &self.inner.current_task.get())
            .field("current_priority", &self.current_priority_level())
            .field("loop_running", &self.is_loop_running())
            .field("flushing", &self.is_flushing())
            .finish()
    }
}

/// Restores the previous priority level on drop, including during unwinding.
struct PriorityScope<'a> {
    inner: &'a Inner,
    previous: PriorityLevel,
}

impl<'a> PriorityScope<'a> {
    fn enter(inner: &'a Inner, priority: PriorityLevel) -> Self {
        let previous = inner.current_priority.replace(priority);
        Self { inner, previous }
    }
}

impl Drop for PriorityScope<'_> {
    fn drop(&mut self) {
        self.inner.current_priority.set(self.previous);
    }
}
