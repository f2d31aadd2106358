//! Input buffering for network synchronization
//!
//! Holds inputs that have been predicted locally and sent to the server but
//! not yet confirmed. Confirmed inputs are discarded; the rest are replayed
//! whenever reconciliation moves the baseline.

use lagless_core::{InputRecord, Millis, Sequence};
use std::collections::VecDeque;

/// FIFO of unconfirmed inputs, oldest first
///
/// Capacity-bounded: pushing into a full buffer drops the oldest record
/// rather than refusing the new one, so local input is never blocked.
#[derive(Debug)]
pub struct InputBuffer {
    /// Pending inputs (oldest first, strictly increasing sequence)
    records: VecDeque<InputRecord>,
    /// Maximum number of inputs to buffer
    capacity: usize,
    /// Highest sequence the server has confirmed
    last_acknowledged: Sequence,
}

impl InputBuffer {
    /// Create a new input buffer with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            last_acknowledged: 0,
        }
    }

    /// Append a record, returning the one evicted to make room, if any
    pub fn push(&mut self, record: InputRecord) -> Option<InputRecord> {
        debug_assert!(
            self.newest_sequence().map_or(true, |s| record.sequence > s),
            "input sequences must be strictly increasing"
        );
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Discard every record with `sequence <= confirmed`
    ///
    /// Returns how many records were confirmed.
    pub fn acknowledge(&mut self, confirmed: Sequence) -> usize {
        self.last_acknowledged = self.last_acknowledged.max(confirmed);
        let split = self.records.partition_point(|r| r.sequence <= confirmed);
        self.records.drain(..split).count()
    }

    /// Records newer than `sequence`, in order (for replay during reconciliation)
    pub fn inputs_after(&self, sequence: Sequence) -> impl Iterator<Item = &InputRecord> {
        self.records.iter().filter(move |r| r.sequence > sequence)
    }

    /// All pending records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &InputRecord> {
        self.records.iter()
    }

    /// Drop records created before `cutoff`; returns how many were dropped
    pub fn prune_older_than(&mut self, cutoff: Millis) -> usize {
        let split = self.records.partition_point(|r| r.timestamp < cutoff);
        self.records.drain(..split).count()
    }

    /// Change the capacity, dropping the oldest records if over the new limit
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        let excess = self.records.len().saturating_sub(self.capacity);
        self.records.drain(..excess).count()
    }

    /// Get the oldest pending sequence
    pub fn oldest_sequence(&self) -> Option<Sequence> {
        self.records.front().map(|r| r.sequence)
    }

    /// Get the newest pending sequence
    pub fn newest_sequence(&self) -> Option<Sequence> {
        self.records.back().map(|r| r.sequence)
    }

    /// Get the highest sequence confirmed so far
    pub fn last_acknowledged(&self) -> Sequence {
        self.last_acknowledged
    }

    /// Get the number of pending inputs
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Clear all pending inputs
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Forget everything, including the acknowledgement watermark
    pub fn reset(&mut self) {
        self.records.clear();
        self.last_acknowledged = 0;
    }

    /// Get the capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagless_core::MovementInput;

    fn record(sequence: Sequence) -> InputRecord {
        InputRecord {
            input: MovementInput::new(1.0, 0.0),
            timestamp: sequence as f64 * 16.0,
            sequence,
        }
    }

    fn filled(capacity: usize, count: Sequence) -> InputBuffer {
        let mut buffer = InputBuffer::new(capacity);
        for seq in 1..=count {
            buffer.push(record(seq));
        }
        buffer
    }

    #[test]
    fn test_push_and_len() {
        let buffer = filled(10, 3);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest_sequence(), Some(1));
        assert_eq!(buffer.newest_sequence(), Some(3));
    }

    #[test]
    fn test_acknowledge() {
        let mut buffer = filled(10, 3);

        assert_eq!(buffer.acknowledge(2), 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.oldest_sequence(), Some(3));
        assert_eq!(buffer.last_acknowledged(), 2);

        // Stale acknowledgements confirm nothing and never lower the watermark
        assert_eq!(buffer.acknowledge(1), 0);
        assert_eq!(buffer.last_acknowledged(), 2);
    }

    #[test]
    fn test_inputs_after() {
        let buffer = filled(10, 4);

        let after_2: Vec<_> = buffer.inputs_after(2).map(|r| r.sequence).collect();
        assert_eq!(after_2, vec![3, 4]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut buffer = filled(3, 3);
        assert!(buffer.is_full());

        let evicted = buffer.push(record(4));
        assert_eq!(evicted.map(|r| r.sequence), Some(1));
        assert_eq!(buffer.len(), 3);

        let order: Vec<_> = buffer.iter().map(|r| r.sequence).collect();
        assert_eq!(order, vec![2, 3, 4]);
    }

    #[test]
    fn test_prune_older_than() {
        let mut buffer = filled(10, 5);

        // timestamps are 16, 32, 48, 64, 80
        assert_eq!(buffer.prune_older_than(40.0), 2);
        assert_eq!(buffer.oldest_sequence(), Some(3));
    }

    #[test]
    fn test_set_capacity() {
        let mut buffer = filled(10, 6);

        assert_eq!(buffer.set_capacity(4), 2);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.oldest_sequence(), Some(3));
    }
}
