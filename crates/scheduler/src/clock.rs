use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds on the scheduler's monotonic timeline.
///
/// Signed so that the Immediate timeout (-1) produces a deadline that is
/// already in the past.
pub type Millis = i64;

/// Monotonic millisecond clock supplied by the host.
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Wall clock backed by [`Instant`], anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        Millis::try_from(self.origin.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }
}

/// Hand-driven clock for tests and simulations.
///
/// Clones share the same underlying time, so a task callback can hold a
/// clone and advance the clock the scheduler reads from.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: Millis) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.get()
    }
}
