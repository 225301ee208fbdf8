use crate::clock::Millis;
use crate::error::SchedulerError;

/// Highest frame rate accepted by [`FrameBudget::force_frame_rate`].
pub const MAX_FRAME_RATE: u32 = 125;

/// Yield controller: tracks the current time slice and decides when the
/// flush loop must hand control back to the host.
///
/// The decision depends on elapsed wall time only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBudget {
    default_interval: Millis,
    frame_interval: Millis,
    slice_start: Millis,
}

impl FrameBudget {
    pub fn new(frame_interval: Millis) -> Self {
        Self {
            default_interval: frame_interval,
            frame_interval,
            slice_start: 0,
        }
    }

    /// Stamp the start of a new slice.
    pub fn start_slice(&mut self, now: Millis) {
        self.slice_start = now;
    }

    pub fn slice_start(&self) -> Millis {
        self.slice_start
    }

    pub fn frame_interval(&self) -> Millis {
        self.frame_interval
    }

    /// True once `now - slice_start >= frame_interval`.
    pub fn should_yield(&self, now: Millis) -> bool {
        now.saturating_sub(self.slice_start) >= self.frame_interval
    }

    /// Derive the frame interval from a target frame rate.
    ///
    /// `fps` in `1..=125` sets the interval to `1000 / fps` ms; `0` restores
    /// the configured default. Higher rates are rejected and leave the
    /// interval unchanged.
    pub fn force_frame_rate(&mut self, fps: u32) -> Result<(), SchedulerError> {
        if fps > MAX_FRAME_RATE {
            return Err(SchedulerError::Config(format!(
                "frame rate must be between 0 and {MAX_FRAME_RATE}, got {fps}"
            )));
        }
        self.frame_interval = if fps == 0 {
            self.default_interval
        } else {
            Millis::from(1000 / fps)
        };
        Ok(())
    }
}
