//! Lagless Rollback Buffer - Bounded history of predicted local states
//!
//! Every predicted input produces one `StateSnapshot`. When the server later
//! confirms that input, reconciliation needs the snapshot to measure how far
//! the prediction drifted. This crate stores those snapshots in a fixed-size
//! ring buffer indexed by input sequence.
//!
//! # Features
//!
//! - **Bounded memory**: Fixed-size ring buffer, no unbounded growth
//! - **O(1) insertion and lookup**: slot = `sequence % capacity`
//! - **Automatic eviction**: the oldest snapshot is overwritten when full
//! - **Time pruning**: snapshots older than a cutoff can be dropped in one pass
//!
//! # Example
//!
//! ```rust
//! use lagless_core::{StateHistory, StateSnapshot};
//! use lagless_rollback_buffer::RollbackBuffer;
//!
//! // 128 inputs at 60fps = ~2 seconds of history
//! let mut buffer = RollbackBuffer::new(128);
//!
//! buffer.save_state(StateSnapshot { x: 1.0, y: 0.0, timestamp: 16.0, sequence: 1 });
//! buffer.save_state(StateSnapshot { x: 2.0, y: 0.0, timestamp: 32.0, sequence: 2 });
//!
//! assert_eq!(buffer.get_state(2).map(|s| s.x), Some(2.0));
//! ```

use lagless_core::{Millis, Sequence, StateHistory, StateSnapshot};

/// A ring buffer of recent state snapshots
///
/// Optimized for the reconciliation lookup: the confirmed sequence maps
/// directly to a slot, and a slot only answers for the sequence it holds.
#[derive(Debug)]
pub struct RollbackBuffer {
    /// Ring buffer storage; `None` means the slot is empty
    slots: Vec<Option<StateSnapshot>>,
    /// Number of snapshots currently stored
    count: usize,
    /// Capacity (max snapshots)
    capacity: usize,
}

impl RollbackBuffer {
    /// Create a new rollback buffer with the given capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of snapshots to store (typically 64-256)
    ///
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            count: 0,
            capacity,
        }
    }

    fn slot_index(&self, sequence: Sequence) -> usize {
        (sequence % self.capacity as u64) as usize
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> BufferStats {
        let (oldest, newest) = self.sequence_range().unwrap_or((0, 0));
        BufferStats {
            capacity: self.capacity,
            count: self.count,
            oldest_sequence: oldest,
            newest_sequence: newest,
        }
    }

    fn retain(&mut self, keep: impl Fn(&StateSnapshot) -> bool) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|s| !keep(s)) {
                *slot = None;
                self.count = self.count.saturating_sub(1);
            }
        }
    }
}

impl StateHistory for RollbackBuffer {
    fn save_state(&mut self, snapshot: StateSnapshot) {
        let index = self.slot_index(snapshot.sequence);
        if self.slots[index].is_none() {
            self.count += 1;
        }
        self.slots[index] = Some(snapshot);
    }

    fn get_state(&self, sequence: Sequence) -> Option<&StateSnapshot> {
        self.slots[self.slot_index(sequence)]
            .as_ref()
            .filter(|s| s.sequence == sequence)
    }

    fn clear_before(&mut self, sequence: Sequence) {
        self.retain(|s| s.sequence >= sequence);
    }

    fn clear_older_than(&mut self, cutoff: Millis) {
        self.retain(|s| s.timestamp >= cutoff);
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.count = 0;
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    fn len(&self) -> usize {
        self.count
    }

    fn sequence_range(&self) -> Option<(Sequence, Sequence)> {
        let mut sequences = self.slots.iter().flatten().map(|s| s.sequence);
        let first = sequences.next()?;
        Some(sequences.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s))))
    }
}

impl Default for RollbackBuffer {
    fn default() -> Self {
        Self::new(128) // ~2 seconds of inputs at 60fps
    }
}

/// Statistics about the rollback buffer
#[derive(Debug, Clone, Copy)]
pub struct BufferStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored snapshots
    pub count: usize,
    /// Oldest sequence in the buffer
    pub oldest_sequence: Sequence,
    /// Newest sequence in the buffer
    pub newest_sequence: Sequence,
}

impl BufferStats {
    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.capacity as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(sequence: Sequence) -> StateSnapshot {
        StateSnapshot {
            x: sequence as f64 * 10.0,
            y: 0.0,
            timestamp: sequence as f64 * 16.0,
            sequence,
        }
    }

    #[test]
    fn test_new() {
        let buffer = RollbackBuffer::new(64);
        assert_eq!(buffer.capacity(), Some(64));
        assert_eq!(buffer.len(), 0);
        assert!(buffer.is_empty());
        assert_eq!(RollbackBuffer::new(0).capacity(), Some(1));
    }

    #[test]
    fn test_save_and_get() {
        let mut buffer = RollbackBuffer::new(64);
        buffer.save_state(snap(10));
        buffer.save_state(snap(11));
        buffer.save_state(snap(12));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get_state(11).map(|s| s.x), Some(110.0));
        assert!(buffer.get_state(13).is_none());
    }

    #[test]
    fn test_overwrite_same_sequence() {
        let mut buffer = RollbackBuffer::new(8);
        buffer.save_state(snap(3));
        let mut moved = snap(3);
        moved.x = -1.0;
        buffer.save_state(moved);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get_state(3).map(|s| s.x), Some(-1.0));
    }

    #[test]
    fn test_ring_buffer_wrap() {
        let mut buffer = RollbackBuffer::new(4);
        for seq in 1..=6 {
            buffer.save_state(snap(seq));
        }

        assert_eq!(buffer.len(), 4);
        // Old snapshots were overwritten by sequences sharing their slot
        assert!(buffer.get_state(1).is_none());
        assert!(buffer.get_state(2).is_none());
        assert!(buffer.get_state(5).is_some());
        assert!(buffer.get_state(6).is_some());
        assert_eq!(buffer.sequence_range(), Some((3, 6)));
    }

    #[test]
    fn test_clear_before() {
        let mut buffer = RollbackBuffer::new(64);
        buffer.save_state(snap(10));
        buffer.save_state(snap(20));
        buffer.save_state(snap(30));

        buffer.clear_before(20);

        assert!(buffer.get_state(10).is_none());
        assert!(buffer.get_state(20).is_some());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_clear_older_than() {
        let mut buffer = RollbackBuffer::new(64);
        for seq in 1..=5 {
            buffer.save_state(snap(seq));
        }

        // timestamps are 16, 32, 48, 64, 80
        buffer.clear_older_than(50.0);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.sequence_range(), Some((4, 5)));

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.sequence_range().is_none());
    }

    #[test]
    fn test_stats() {
        let mut buffer = RollbackBuffer::new(64);
        buffer.save_state(snap(10));
        buffer.save_state(snap(20));
        buffer.save_state(snap(30));

        let stats = buffer.stats();
        assert_eq!(stats.capacity, 64);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.oldest_sequence, 10);
        assert_eq!(stats.newest_sequence, 30);
        assert!((stats.fill_ratio() - 3.0 / 64.0).abs() < 1e-6);

        buffer.clear();
        let empty = buffer.stats();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.fill_ratio(), 0.0);
    }
}
