//! Render-side easing after local corrections
//!
//! When reconciliation or a server teleport moves the local actor, the
//! simulation snaps at once but the rendered position eases over a short
//! window instead. The smoother never stores absolute points: it keeps the
//! rendered position and the target as offsets from local state at the moment
//! the window opened, and blends between them along a quadratic ease-in-out
//! curve. Local movement during the window carries through to the render.
//!
//! Once the window elapses the target offset is held, so the render lands on
//! the target exactly. For corrections the target is local state itself and
//! the held offset is zero.

use lagless_core::{ease_in_out_quad, DVec2, Millis};

/// Visual offset from local state, eased over a fixed window
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectionSmoother {
    /// Rendered position minus local state when the window opened
    from: DVec2,
    /// Target minus local state when the window opened
    to: DVec2,
    started_at: Millis,
    duration_ms: Millis,
    active: bool,
}

impl CorrectionSmoother {
    /// Create an idle smoother
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window easing from `rendered` onto `target`
    ///
    /// `local` is the simulated position both are measured against. A zero
    /// duration lands on the target at once.
    pub fn start(
        &mut self,
        rendered: DVec2,
        target: DVec2,
        local: DVec2,
        now: Millis,
        duration_ms: Millis,
    ) {
        self.from = rendered - local;
        self.to = target - local;
        self.started_at = now;
        self.duration_ms = duration_ms.max(0.0);
        self.active = self.duration_ms > 0.0 && self.from != self.to;
        if !self.active {
            self.from = self.to;
        }
    }

    /// Fraction of the window elapsed, in [0, 1]
    pub fn progress(&self, now: Millis) -> f64 {
        if !self.active {
            return 1.0;
        }
        ((now - self.started_at) / self.duration_ms).clamp(0.0, 1.0)
    }

    /// Offset to add to the simulated position at `now`
    pub fn offset_at(&self, now: Millis) -> DVec2 {
        let t = self.progress(now);
        if t >= 1.0 {
            return self.to;
        }
        self.from + (self.to - self.from) * ease_in_out_quad(t)
    }

    /// Close the window once it has elapsed; returns whether it is still open
    pub fn advance(&mut self, now: Millis) -> bool {
        if self.active && self.progress(now) >= 1.0 {
            self.active = false;
            self.from = self.to;
        }
        self.active
    }

    /// Whether a window is open
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Drop any open window and any held offset
    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_rendered_position() {
        let mut smoother = CorrectionSmoother::new();
        let local = DVec2::new(20.0, 0.0);
        smoother.start(DVec2::new(10.0, 0.0), local, local, 0.0, 100.0);

        assert_eq!(local + smoother.offset_at(0.0), DVec2::new(10.0, 0.0));
    }

    #[test]
    fn test_eases_to_local() {
        let mut smoother = CorrectionSmoother::new();
        let local = DVec2::new(10.0, 0.0);
        smoother.start(DVec2::ZERO, local, local, 0.0, 100.0);

        let quarter = smoother.offset_at(25.0).x;
        let half = smoother.offset_at(50.0).x;
        let late = smoother.offset_at(90.0).x;
        // offset runs from -10 towards 0, slowly at first
        assert!(quarter < half && half < late);
        assert!((half - -5.0).abs() < 1e-9);
        assert!(quarter < -8.0);

        assert_eq!(smoother.offset_at(100.0), DVec2::ZERO);
        assert!(!smoother.advance(100.0));
        assert!(!smoother.is_active());
    }

    #[test]
    fn test_lands_on_target_away_from_local() {
        let mut smoother = CorrectionSmoother::new();
        let local = DVec2::new(10.0, 0.0);
        smoother.start(local, DVec2::ZERO, local, 0.0, 100.0);

        assert_eq!(local + smoother.offset_at(0.0), local);
        let mid = (local + smoother.offset_at(50.0)).x;
        assert!((mid - 5.0).abs() < 1e-9);
        assert_eq!(local + smoother.offset_at(100.0), DVec2::ZERO);

        // The target stays put after the window closes
        smoother.advance(150.0);
        assert!(!smoother.is_active());
        assert_eq!(local + smoother.offset_at(150.0), DVec2::ZERO);
    }

    #[test]
    fn test_zero_offset_is_inactive() {
        let mut smoother = CorrectionSmoother::new();
        let at = DVec2::new(5.0, 5.0);
        smoother.start(at, at, at, 0.0, 100.0);
        assert!(!smoother.is_active());
        assert_eq!(smoother.offset_at(10.0), DVec2::ZERO);
    }

    #[test]
    fn test_zero_duration_snaps_to_target() {
        let mut smoother = CorrectionSmoother::new();
        smoother.start(DVec2::ZERO, DVec2::new(3.0, 0.0), DVec2::ZERO, 0.0, 0.0);
        assert!(!smoother.is_active());
        assert_eq!(smoother.offset_at(0.0), DVec2::new(3.0, 0.0));
    }

    #[test]
    fn test_cancel() {
        let mut smoother = CorrectionSmoother::new();
        smoother.start(DVec2::ZERO, DVec2::new(1.0, 0.0), DVec2::ZERO, 0.0, 100.0);
        smoother.cancel();
        assert_eq!(smoother.offset_at(10.0), DVec2::ZERO);
    }
}
