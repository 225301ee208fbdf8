//! Cooperative, single-threaded task scheduler.
//!
//! Work is enqueued with a [`PriorityLevel`], which only shapes the task's
//! initial deadline. Tasks then run in `(expiration_time, id)` order on one
//! logical thread, in time slices bounded by the frame interval. Between
//! slices the scheduler hands control back to the host through a
//! [`HostPort`] and resumes when the host calls back.

pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod host;
pub mod metrics;
pub mod priority;
pub(crate) mod queue;
pub mod runner;
pub mod task;

pub use clock::{Clock, ManualClock, Millis, MonotonicClock};
pub use config::SchedulerConfig;
pub use error::{SchedulerError, TaskError};
pub use frame::FrameBudget;
pub use host::{HostCallback, HostPort, LocalSetHost, ManualHost};
pub use metrics::SchedulerMetrics;
pub use priority::{PriorityLevel, timeout_for};
pub use runner::{Scheduler, WeakScheduler};
pub use task::{TaskHandle, TaskId, TaskResult, TaskStep};
