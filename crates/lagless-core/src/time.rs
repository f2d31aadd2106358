//! Time sources for frame-driven netcode
//!
//! Every timeout in lagless (extrapolation windows, pruning, smoothing) is a
//! timestamp comparison against "now". The clock is injected so that behavior
//! is deterministic under test:
//! - `TimeSource` - monotonic milliseconds
//! - `SystemClock` - wall-clock backed by `Instant`
//! - `ManualClock` - shared, hand-advanced clock for tests and replays

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds on a monotonic timeline
pub type Millis = f64;

/// A monotonic source of "now", in milliseconds
pub trait TimeSource {
    /// Current time in milliseconds. Must never go backwards.
    fn now_ms(&self) -> Millis;
}

/// Monotonic clock measured from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose zero is the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock
///
/// Clones share the same timeline, so a test can hand one clone to each
/// component and advance them all at once.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at `start_ms`
    pub fn starting_at(start_ms: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Move the clock forward by `delta_ms` (negative values are ignored)
    pub fn advance(&self, delta_ms: Millis) {
        if delta_ms > 0.0 {
            self.now.set(self.now.get() + delta_ms);
        }
    }

    /// Jump to `ms`; ignored if it would move time backwards
    pub fn set(&self, ms: Millis) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}
