//! Local movement state and the records prediction keeps about it

use glam::DVec2;
use crate::time::Millis;
use serde::{Deserialize, Serialize};

/// Monotonic input sequence number, starting at 1
pub type Sequence = u64;

/// Position of the locally controlled actor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalMovementState {
    pub x: f64,
    pub y: f64,
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub timestamp: Millis,
}

impl LocalMovementState {
    /// Create a state at the given position
    pub fn new(x: f64, y: f64, chunk_x: i32, chunk_y: i32) -> Self {
        Self {
            x,
            y,
            chunk_x,
            chunk_y,
            timestamp: 0.0,
        }
    }

    /// Position as a vector
    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// Overwrite the position, keeping chunk and timestamp
    pub fn set_position(&mut self, position: DVec2) {
        self.x = position.x;
        self.y = position.y;
    }

    /// Copy of this state with a different position
    pub fn with_position(mut self, position: DVec2) -> Self {
        self.set_position(position);
        self
    }
}

/// One frame of movement intent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementInput {
    /// Horizontal axis, nominally in [-1, 1]
    pub move_x: f64,
    /// Vertical axis, nominally in [-1, 1]
    pub move_y: f64,
}

impl MovementInput {
    /// Create an input from axis values
    pub fn new(move_x: f64, move_y: f64) -> Self {
        Self { move_x, move_y }
    }

    /// No movement
    pub fn idle() -> Self {
        Self::default()
    }

    /// Movement direction, clamped to unit length so diagonals are not faster
    ///
    /// Non-finite axes yield no movement.
    pub fn direction(&self) -> DVec2 {
        let dir = DVec2::new(self.move_x, self.move_y);
        if !dir.is_finite() {
            return DVec2::ZERO;
        }
        let len = dir.length();
        if len > 1.0 {
            dir * (1.0 / len)
        } else {
            dir
        }
    }

    /// Whether this input moves the actor at all
    pub fn is_idle(&self) -> bool {
        self.direction() == DVec2::ZERO
    }
}

/// A sequenced input waiting for server confirmation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub input: MovementInput,
    pub timestamp: Millis,
    pub sequence: Sequence,
}

/// Local position right after the input with `sequence` was applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub x: f64,
    pub y: f64,
    pub timestamp: Millis,
    pub sequence: Sequence,
}

impl StateSnapshot {
    /// Capture the position of `state` for `sequence`
    pub fn capture(state: &LocalMovementState, sequence: Sequence) -> Self {
        Self {
            x: state.x,
            y: state.y,
            timestamp: state.timestamp,
            sequence,
        }
    }

    /// Position as a vector
    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }
}

/// Outbound move message handed to the transport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovePayload {
    pub input: MovementInput,
    pub sequence: Sequence,
    pub timestamp: Millis,
}

impl From<&InputRecord> for MovePayload {
    fn from(record: &InputRecord) -> Self {
        Self {
            input: record.input,
            sequence: record.sequence,
            timestamp: record.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_normalized() {
        let diag = MovementInput::new(1.0, 1.0).direction();
        assert!((diag.length() - 1.0).abs() < 1e-12);

        let half = MovementInput::new(0.5, 0.0).direction();
        assert_eq!(half, DVec2::new(0.5, 0.0));
    }

    #[test]
    fn test_direction_non_finite() {
        assert!(MovementInput::new(f64::NAN, 1.0).is_idle());
        assert!(MovementInput::idle().is_idle());
    }

    #[test]
    fn test_snapshot_capture() {
        let mut state = LocalMovementState::new(3.0, 4.0, 0, 0);
        state.timestamp = 12.0;
        let snap = StateSnapshot::capture(&state, 9);
        assert_eq!(snap.position(), DVec2::new(3.0, 4.0));
        assert_eq!(snap.sequence, 9);
        assert_eq!(snap.timestamp, 12.0);
    }

    #[test]
    fn test_payload_from_record() {
        let record = InputRecord {
            input: MovementInput::new(1.0, 0.0),
            timestamp: 5.0,
            sequence: 3,
        };
        let payload = MovePayload::from(&record);
        assert_eq!(payload.sequence, 3);
        assert_eq!(payload.input, record.input);
    }
}
