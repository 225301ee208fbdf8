//! Scheduler runner -- task queue ownership, the flush loop and the host loop.
//!
//! Split into focused submodules:
//! - `core`: Scheduler handle, constructor, enqueue/cancel and accessors
//! - `flush`: slice-bounded flush loop with unconditional state cleanup
//! - `host_loop`: re-invocation protocol over the host's deferred callbacks

mod core;
mod flush;
mod host_loop;

pub use self::core::{Scheduler, WeakScheduler};
