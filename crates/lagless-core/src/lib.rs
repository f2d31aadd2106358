//! Lagless Core - Shared contracts for latency hiding
//!
//! This crate provides the types exchanged between the netcode engines, the
//! transport, and the renderer:
//! - Local movement state, inputs, and per-input snapshots
//! - Entity identifiers for remote actors
//! - Shortest-path angle blending and easing (positions are `glam::DVec2`)
//! - Injectable monotonic time sources
//! - The `StateHistory` trait implemented by history stores
//!
//! Nothing here performs I/O or owns global state. Components are built as
//! explicit instances and receive their clock by injection:
//!
//! ```rust
//! use lagless_core::{ManualClock, TimeSource};
//!
//! let clock = ManualClock::new();
//! clock.advance(16.0);
//! assert_eq!(clock.now_ms(), 16.0);
//! ```

mod error;
mod identity;
pub mod math;
mod state;
mod state_history;
pub mod time;

pub use error::{ensure_finite, Error, Result};
pub use identity::EntityId;
pub use glam::DVec2;
pub use math::{angle_delta, approach, ease_in_out_quad, lerp_angle, wrap_angle};
pub use state::{InputRecord, LocalMovementState, MovePayload, MovementInput, Sequence, StateSnapshot};
pub use state_history::StateHistory;
pub use time::{ManualClock, Millis, SystemClock, TimeSource};
