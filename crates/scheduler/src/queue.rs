//! Deadline-ordered task queue.
//!
//! A binary min-heap of compact `(sort_index, id)` entries over a stable
//! task store keyed by [`TaskId`]. The heap backbone only moves small `Copy`
//! entries during sifts; callbacks and task metadata stay put in the store.
//!
//! # Ordering
//!
//! Smallest `sort_index` first. Equal `sort_index` values resolve by
//! ascending `id`, so equal deadlines run in insertion order.
//!
//! # Lazy deletion
//!
//! Cancelled tasks keep their heap slot and store entry. They are reclaimed
//! only when they reach the root and are popped.

use std::collections::HashMap;

use crate::clock::Millis;
use crate::task::{TaskId, TaskRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    sort_index: Millis,
    id: TaskId,
}

/// Min-heap of pending tasks.
///
/// # Invariants
///
/// - Every heap entry has a matching store entry, and vice versa.
/// - For every entry at `i` with parent `p = (i - 1) / 2`:
///   `(heap[p].sort_index, heap[p].id) <= (heap[i].sort_index, heap[i].id)`.
///
/// | Operation | Time     |
/// |-----------|----------|
/// | push      | O(log n) |
/// | pop       | O(log n) |
/// | peek      | O(1)     |
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    heap: Vec<HeapEntry>,
    tasks: HashMap<TaskId, TaskRecord>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Id of the task with the smallest `(sort_index, id)`, without removing it.
    pub(crate) fn peek(&self) -> Option<TaskId> {
        self.heap.first().map(|entry| entry.id)
    }

    /// The root task itself.
    pub(crate) fn peek_task(&self) -> Option<&TaskRecord> {
        self.peek().and_then(|id| self.tasks.get(&id))
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.tasks.get_mut(&id)
    }

    /// Insert a task and sift it up to its position.
    pub(crate) fn push(&mut self, task: TaskRecord) {
        let entry = HeapEntry {
            sort_index: task.sort_index,
            id: task.id,
        };
        self.tasks.insert(task.id, task);

        let pos = self.heap.len();
        self.heap.push(entry);
        self.sift_up(pos);
    }

    /// Remove and return the root task.
    pub(crate) fn pop(&mut self) -> Option<TaskRecord> {
        if self.heap.is_empty() {
            return None;
        }

        let root = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        self.tasks.remove(&root.id)
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.heap[pos] < self.heap[parent] {
                self.heap.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < len && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }

            if smallest == pos {
                break;
            }

            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }

    #[cfg(test)]
    fn is_valid_heap(&self) -> bool {
        (1..self.heap.len()).all(|i| self.heap[(i - 1) / 2] <= self.heap[i])
            && self.heap.len() == self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::PriorityLevel;
    use crate::task::TaskStep;

    fn task(id: u64, sort_index: Millis) -> TaskRecord {
        TaskRecord::new(
            TaskId(id),
            PriorityLevel::Normal,
            0,
            sort_index,
            Box::new(|_| Ok(TaskStep::Done)),
        )
    }

    fn drain(queue: &mut TaskQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop()).map(|t| t.id.get()).collect()
    }

    #[test]
    fn empty_queue() {
        let mut queue = TaskQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.peek().is_none());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn pops_in_deadline_order() {
        let mut queue = TaskQueue::new();
        for (id, deadline) in [(1, 50), (2, 10), (3, 40), (4, 20), (5, 30)] {
            queue.push(task(id, deadline));
            assert!(queue.is_valid_heap());
        }

        assert_eq!(queue.peek(), Some(TaskId(2)));
        assert_eq!(drain(&mut queue), vec![2, 4, 5, 3, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_deadlines_resolve_by_id() {
        let mut queue = TaskQueue::new();
        for id in [7, 3, 9, 1, 5] {
            queue.push(task(id, 100));
        }
        assert_eq!(drain(&mut queue), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn peek_does_not_remove() {
        let mut queue = TaskQueue::new();
        queue.push(task(1, 5));
        assert_eq!(queue.peek(), Some(TaskId(1)));
        assert_eq!(queue.peek_task().map(|t| t.sort_index), Some(5));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn store_tracks_heap_entries() {
        let mut queue = TaskQueue::new();
        queue.push(task(1, 5));
        queue.push(task(2, 3));

        assert!(queue.get_mut(TaskId(1)).unwrap().cancel().is_some());
        assert!(queue.get(TaskId(1)).unwrap().cancelled);
        assert_eq!(queue.len(), 2, "cancelled task keeps its slot");

        let popped = queue.pop().unwrap();
        assert_eq!(popped.id, TaskId(2));
        assert!(queue.get(TaskId(2)).is_none());
        assert!(queue.get(TaskId(1)).is_some());
    }

    #[test]
    fn interleaved_push_pop_keeps_heap_property() {
        let mut queue = TaskQueue::new();
        let mut next_id = 0;
        let mut popped = Vec::new();
        // Deterministic pseudo-random deadlines.
        let mut seed: i64 = 17;
        for round in 0..200 {
            seed = (seed * 1_103_515_245 + 12_345) % 2_147_483_648;
            queue.push(task(next_id, seed % 50));
            next_id += 1;
            if round % 3 == 0 {
                popped.push(queue.pop().unwrap());
            }
            assert!(queue.is_valid_heap());
        }

        let mut last: Option<(Millis, TaskId)> = None;
        while let Some(t) = queue.pop() {
            let key = (t.sort_index, t.id);
            if let Some(prev) = last {
                assert!(prev <= key, "{prev:?} popped before {key:?}");
            }
            last = Some(key);
        }
        assert_eq!(popped.len(), 67);
    }
}
