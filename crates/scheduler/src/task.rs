use std::fmt;

use crate::clock::Millis;
use crate::error::TaskError;
use crate::priority::PriorityLevel;

/// Monotonically increasing task identifier. Never reused; only used to
/// break ties between equal deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Opaque handle returned by `enqueue`, used to cancel a specific task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub(crate) TaskId);

impl TaskHandle {
    pub fn id(self) -> TaskId {
        self.0
    }
}

/// Outcome of a task callback.
pub type TaskResult = Result<TaskStep, TaskError>;

/// Task callback. Receives `did_timeout`: whether the task's deadline had
/// already passed when this step started.
pub type TaskCallback = Box<dyn FnOnce(bool) -> TaskResult>;

/// What a task callback asks the scheduler to do next.
pub enum TaskStep {
    /// The task is finished and leaves the queue.
    Done,
    /// More work remains under the same task. The callback is reattached
    /// in place, keeping the task's deadline and queue position.
    Continue(TaskCallback),
}

impl TaskStep {
    /// Build a continuation from a closure.
    pub fn continue_with<F>(next: F) -> Self
    where
        F: FnOnce(bool) -> TaskResult + 'static,
    {
        Self::Continue(Box::new(next))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Debug for TaskStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Continue(_) => f.write_str("Continue(..)"),
        }
    }
}

/// A pending task in the scheduler's task store.
pub(crate) struct TaskRecord {
    pub(crate) id: TaskId,
    /// Absent while the callback is executing, once consumed, or once cancelled.
    pub(crate) callback: Option<TaskCallback>,
    pub(crate) priority: PriorityLevel,
    pub(crate) start_time: Millis,
    pub(crate) expiration_time: Millis,
    /// Heap ordering key; always equal to `expiration_time`.
    pub(crate) sort_index: Millis,
    pub(crate) cancelled: bool,
    /// Ran to completion (or aborted) but still occupies a heap slot.
    pub(crate) finished: bool,
}

impl TaskRecord {
    pub(crate) fn new(
        id: TaskId,
        priority: PriorityLevel,
        start_time: Millis,
        expiration_time: Millis,
        callback: TaskCallback,
    ) -> Self {
        Self {
            id,
            callback: Some(callback),
            priority,
            start_time,
            expiration_time,
            sort_index: expiration_time,
            cancelled: false,
            finished: false,
        }
    }

    /// Mark the task inert and detach its callback. The task stays queued
    /// until the heap reaches it.
    ///
    /// The detached callback is returned so the caller can drop it outside
    /// any queue borrow.
    pub(crate) fn cancel(&mut self) -> Option<TaskCallback> {
        self.cancelled = true;
        self.callback.take()
    }

    /// Mark a task that will never run again, without counting it as
    /// cancelled.
    pub(crate) fn finish(&mut self) -> Option<TaskCallback> {
        self.finished = true;
        self.callback.take()
    }

    /// Still waiting to run a step.
    pub(crate) fn is_live(&self) -> bool {
        !self.cancelled && !self.finished
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("start_time", &self.start_time)
            .field("expiration_time", &self.expiration_time)
            .field("sort_index", &self.sort_index)
            .field("has_callback", &self.callback.is_some())
            .field("cancelled", &self.cancelled)
            .field("finished", &self.finished)
            .finish()
    }
}
