//! Blending math shared by prediction and interpolation
//!
//! - `wrap_angle` / `lerp_angle` - shortest-path angular blending
//! - `ease_in_out_quad` - easing curve for correction windows

use std::f64::consts::{PI, TAU};

/// Wrap an angle (radians) into [-PI, PI]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps +PI onto -PI; keep the sign of the input at the seam
    if wrapped == -PI && angle > 0.0 {
        PI
    } else {
        wrapped
    }
}

/// Signed shortest-path difference `to - from`, in [-PI, PI]
pub fn angle_delta(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}

/// Blend two angles along the shortest arc
///
/// Never blends raw values, so 3.0 -> -3.0 travels the ~0.28 rad gap
/// across the +/-PI seam instead of sweeping ~6 rad the long way round.
pub fn lerp_angle(from: f64, to: f64, t: f64) -> f64 {
    wrap_angle(from + angle_delta(from, to) * t)
}

/// Quadratic ease-in-out on `t` in [0, 1]
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// One step of exponential smoothing: move `current` a `factor` share towards `target`
pub fn approach(current: f64, target: f64, factor: f64) -> f64 {
    current + (target - current) * factor
}
