use serde::{Deserialize, Serialize};

use crate::clock::Millis;

/// Timeout for Immediate work: already expired when enqueued.
pub const IMMEDIATE_PRIORITY_TIMEOUT: Millis = -1;
/// Timeout for work blocking on user input.
pub const USER_BLOCKING_PRIORITY_TIMEOUT: Millis = 250;
/// Timeout for ordinary work, and the fallback for unknown levels.
pub const NORMAL_PRIORITY_TIMEOUT: Millis = 5_000;
/// Timeout for work that tolerates delay.
pub const LOW_PRIORITY_TIMEOUT: Millis = 10_000;
/// Idle work never expires in practice (max signed 31-bit integer).
pub const IDLE_PRIORITY_TIMEOUT: Millis = 1_073_741_823;

/// Task priority level. Lower numeric code = more urgent.
///
/// Priority only shapes a task's initial deadline; once enqueued, tasks are
/// ordered purely by `(expiration_time, id)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    /// Must run now; the deadline is already in the past.
    Immediate = 1,
    /// Result of user interaction, expected within a quarter second.
    UserBlocking = 2,
    /// Default level.
    #[default]
    Normal = 3,
    /// Can wait, but must eventually run.
    Low = 4,
    /// Runs only when nothing else is pending.
    Idle = 5,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::Immediate,
        PriorityLevel::UserBlocking,
        PriorityLevel::Normal,
        PriorityLevel::Low,
        PriorityLevel::Idle,
    ];

    /// Map a raw numeric code to a level. Unknown codes fall back to Normal.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Immediate,
            2 => Self::UserBlocking,
            3 => Self::Normal,
            4 => Self::Low,
            5 => Self::Idle,
            _ => Self::Normal,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Timeout added to the enqueue time to form the task's deadline.
    pub fn timeout(self) -> Millis {
        match self {
            Self::Immediate => IMMEDIATE_PRIORITY_TIMEOUT,
            Self::UserBlocking => USER_BLOCKING_PRIORITY_TIMEOUT,
            Self::Normal => NORMAL_PRIORITY_TIMEOUT,
            Self::Low => LOW_PRIORITY_TIMEOUT,
            Self::Idle => IDLE_PRIORITY_TIMEOUT,
        }
    }
}

impl From<u8> for PriorityLevel {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

/// Timeout for a priority level.
pub fn timeout_for(priority: PriorityLevel) -> Millis {
    priority.timeout()
}

/// Deadline for a task enqueued at `now`.
pub fn expiration_time(now: Millis, priority: PriorityLevel) -> Millis {
    now.saturating_add(timeout_for(priority))
}
