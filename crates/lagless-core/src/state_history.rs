//! State history trait for locating past local states by input sequence
//!
//! This trait is used by:
//! - `lagless-netcode` to find the local state an input produced when the
//!   server confirms it
//! - `lagless-rollback-buffer` for the bounded ring buffer implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use lagless_core::{StateHistory, StateSnapshot};
//!
//! struct MyHistory {
//!     states: Vec<StateSnapshot>,
//! }
//!
//! impl StateHistory for MyHistory {
//!     fn save_state(&mut self, snapshot: StateSnapshot) {
//!         self.states.push(snapshot);
//!     }
//!
//!     fn get_state(&self, sequence: u64) -> Option<&StateSnapshot> {
//!         self.states.iter().find(|s| s.sequence == sequence)
//!     }
//!
//!     // ... other methods
//! }
//! ```

use crate::state::{Sequence, StateSnapshot};
use crate::time::Millis;

/// Trait for storing and retrieving past local states.
///
/// Implementations can choose different storage strategies:
/// - Ring buffer (bounded, fast, for real-time)
/// - Growing vector (unbounded, for debugging)
pub trait StateHistory {
    /// Save a snapshot, replacing any existing one with the same sequence.
    fn save_state(&mut self, snapshot: StateSnapshot);

    /// Get the snapshot taken for exactly this sequence, if it exists.
    fn get_state(&self, sequence: Sequence) -> Option<&StateSnapshot>;

    /// Drop all snapshots with a sequence lower than `sequence`.
    fn clear_before(&mut self, sequence: Sequence);

    /// Drop all snapshots captured before `cutoff`.
    fn clear_older_than(&mut self, cutoff: Millis);

    /// Clear all stored snapshots.
    fn clear(&mut self);

    /// Get the capacity of this history.
    ///
    /// Returns `None` for unbounded histories.
    fn capacity(&self) -> Option<usize>;

    /// Get the number of snapshots currently stored.
    fn len(&self) -> usize;

    /// Check if the history is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the `(oldest, newest)` sequence range of stored snapshots.
    fn sequence_range(&self) -> Option<(Sequence, Sequence)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Simple in-memory implementation for testing
    struct SimpleHistory {
        states: Vec<StateSnapshot>,
    }

    impl SimpleHistory {
        fn new() -> Self {
            Self { states: Vec::new() }
        }
    }

    impl StateHistory for SimpleHistory {
        fn save_state(&mut self, snapshot: StateSnapshot) {
            self.states.retain(|s| s.sequence != snapshot.sequence);
            self.states.push(snapshot);
            self.states.sort_by_key(|s| s.sequence);
        }

        fn get_state(&self, sequence: Sequence) -> Option<&StateSnapshot> {
            self.states.iter().find(|s| s.sequence == sequence)
        }

        fn clear_before(&mut self, sequence: Sequence) {
            self.states.retain(|s| s.sequence >= sequence);
        }

        fn clear_older_than(&mut self, cutoff: Millis) {
            self.states.retain(|s| s.timestamp >= cutoff);
        }

        fn clear(&mut self) {
            self.states.clear();
        }

        fn capacity(&self) -> Option<usize> {
            None
        }

        fn len(&self) -> usize {
            self.states.len()
        }

        fn sequence_range(&self) -> Option<(Sequence, Sequence)> {
            Some((self.states.first()?.sequence, self.states.last()?.sequence))
        }
    }

    fn snap(sequence: Sequence, timestamp: Millis) -> StateSnapshot {
        StateSnapshot {
            x: sequence as f64,
            y: 0.0,
            timestamp,
            sequence,
        }
    }

    #[test]
    fn test_save_and_get() {
        let mut history = SimpleHistory::new();
        history.save_state(snap(1, 0.0));
        history.save_state(snap(2, 16.0));

        assert_eq!(history.get_state(2).map(|s| s.x), Some(2.0));
        assert!(history.get_state(3).is_none());
        assert!(!history.is_empty());
        assert_eq!(history.sequence_range(), Some((1, 2)));
    }

    #[test]
    fn test_clear_before() {
        let mut history = SimpleHistory::new();
        history.save_state(snap(10, 0.0));
        history.save_state(snap(20, 0.0));

        history.clear_before(15);
        assert!(history.get_state(10).is_none());
        assert_eq!(history.sequence_range(), Some((20, 20)));
    }

    #[test]
    fn test_clear_older_than() {
        let mut history = SimpleHistory::new();
        history.save_state(snap(1, 0.0));
        history.save_state(snap(2, 1500.0));
        history.save_state(snap(3, 2500.0));

        history.clear_older_than(1000.0);
        assert_eq!(history.len(), 2);
        assert!(history.get_state(1).is_none());
    }
}
