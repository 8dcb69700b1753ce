//! Bounded rolling history for chart series.
//!
//! Each tracked metric series (CPU utilization, memory, GPU, per-interface
//! network throughput) keeps one `RingHistory`. Insertion order is
//! chronological and is used directly as the chart x-axis.

use std::collections::VecDeque;

/// Default number of samples retained per series.
pub const DEFAULT_CAPACITY: usize = 60;

/// Fixed-capacity, insertion-ordered sample buffer.
///
/// `push` always appends; when the buffer is full the single oldest sample
/// is evicted first (strict FIFO). Capacity is fixed at construction.
#[derive(Debug, Clone)]
pub struct RingHistory<T> {
    capacity: usize,
    samples: VecDeque<T>,
}

impl<T> RingHistory<T> {
    /// Create a history with the given capacity. Capacity 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> RingHistory<T> {
    /// Owned copy of the current samples, oldest first. Later pushes are
    /// never observable through a previously returned snapshot.
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

impl<T> Default for RingHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_is_min_of_pushes_and_capacity() {
        for capacity in [1usize, 3, 60] {
            let mut history = RingHistory::new(capacity);
            for k in 1..=capacity * 2 + 5 {
                history.push(k);
                assert_eq!(history.len(), k.min(capacity));
            }
        }
    }

    #[test]
    fn test_eviction_keeps_last_samples_in_order() {
        let mut history = RingHistory::new(3);
        for k in 1..=7 {
            history.push(k);
        }
        assert_eq!(history.snapshot(), vec![5, 6, 7]);
    }

    #[test]
    fn test_fewer_pushes_than_capacity() {
        let mut history = RingHistory::new(60);
        history.push("a");
        history.push("b");
        assert_eq!(history.snapshot(), vec!["a", "b"]);
    }

    #[test]
    fn test_snapshot_does_not_observe_later_pushes() {
        let mut history = RingHistory::new(4);
        history.push(1);
        let snapshot = history.snapshot();
        history.push(2);
        assert_eq!(snapshot, vec![1]);
        assert_eq!(history.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = RingHistory::new(0);
        history.push(1);
        history.push(2);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.snapshot(), vec![2]);
    }
}
