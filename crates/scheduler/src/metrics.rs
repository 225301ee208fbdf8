use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::priority::PriorityLevel;

/// Scheduler operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Tasks accepted by `enqueue`.
    pub tasks_enqueued: u64,
    /// Tasks whose callback finished with `Done`, by priority level.
    pub tasks_completed: HashMap<PriorityLevel, u64>,
    /// Tasks whose callback returned an error.
    pub tasks_failed: u64,
    /// Cancelled tasks discarded when they reached the head of the queue.
    pub tasks_discarded: u64,
    /// Callback invocations that returned a continuation.
    pub continuations: u64,
    /// Callback invocations that started after their deadline.
    pub timed_out_steps: u64,
    /// Flush passes run.
    pub flushes: u64,
    /// Flush passes that ended with work still queued.
    pub yields: u64,
    /// When the most recent flush started.
    pub last_flush: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    pub fn record_flush(&mut self) {
        self.flushes += 1;
        self.last_flush = Some(Utc::now());
    }

    pub fn record_completion(&mut self, priority: PriorityLevel) {
        *self.tasks_completed.entry(priority).or_default() += 1;
    }

    /// Total completed tasks across all levels.
    pub fn total_completed(&self) -> u64 {
        self.tasks_completed.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics() {
        let m = SchedulerMetrics::default();
        assert_eq!(m.tasks_enqueued, 0);
        assert_eq!(m.total_completed(), 0);
        assert!(m.last_flush.is_none());
    }

    #[test]
    fn completions_are_counted_per_priority() {
        let mut m = SchedulerMetrics::default();
        m.record_completion(PriorityLevel::Normal);
        m.record_completion(PriorityLevel::Normal);
        m.record_completion(PriorityLevel::Idle);

        assert_eq!(m.tasks_completed[&PriorityLevel::Normal], 2);
        assert_eq!(m.tasks_completed[&PriorityLevel::Idle], 1);
        assert_eq!(m.total_completed(), 3);
    }

    #[test]
    fn record_flush_stamps_time() {
        let mut m = SchedulerMetrics::default();
        m.record_flush();
        assert_eq!(m.flushes, 1);
        assert!(m.last_flush.is_some());
    }

    #[test]
    fn serializes_priority_keys_by_name() {
        let mut m = SchedulerMetrics::default();
        m.record_completion(PriorityLevel::UserBlocking);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["tasks_completed"]["user_blocking"], 1);
    }
}
