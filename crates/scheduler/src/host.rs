//! Host deferred-invocation ports.
//!
//! The scheduler never calls itself back directly. When work remains after
//! a slice, it asks the host, through a [`HostPort`], to invoke it again
//! once the current synchronous execution has unwound and other host work
//! has had a turn.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

/// Zero-argument callback handed to the host.
pub type HostCallback = Box<dyn FnOnce()>;

/// Deferred-invocation primitive supplied by the host.
pub trait HostPort {
    /// Schedule `callback` to run after the current synchronous execution
    /// completes. Implementations must never run it on the caller's stack.
    fn request_callback(&self, callback: HostCallback);
}

/// In-process FIFO of deferred callbacks, drained explicitly by the embedder.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct ManualHost {
    pending: Rc<RefCell<VecDeque<HostCallback>>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Run the oldest pending callback. Returns false if none was pending.
    pub fn run_next(&self) -> bool {
        // Release the borrow before running: the callback may request more.
        let next = self.pending.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run callbacks until none remain or `limit` have run. Returns how
    /// many ran.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualHost")
            .field("pending", &self.pending())
            .finish()
    }
}

impl HostPort for ManualHost {
    fn request_callback(&self, callback: HostCallback) {
        self.pending.borrow_mut().push_back(callback);
        trace!(pending = self.pending(), "host callback requested");
    }
}

/// Tokio host: each callback becomes a local task on the current
/// [`tokio::task::LocalSet`], so it runs after the calling task yields.
///
/// Must be used from within a `LocalSet` context; `spawn_local` panics
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSetHost;

impl LocalSetHost {
    pub fn new() -> Self {
        Self
    }
}

impl HostPort for LocalSetHost {
    fn request_callback(&self, callback: HostCallback) {
        tokio::task::spawn_local(async move {
            callback();
        });
    }
}
