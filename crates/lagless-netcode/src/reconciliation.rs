//! Server state reconciliation
//!
//! Decides whether an authoritative position differs enough from what was
//! predicted to warrant a correction, and replays unconfirmed inputs on top of
//! a corrected baseline.

use crate::config::PredictionConfig;
use crate::prediction::predict_step;
use lagless_core::{DVec2, InputRecord, LocalMovementState};

/// Result of comparing a prediction against the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Drift is inside the dead zone; keep the prediction
    WithinDeadZone { error: f64 },
    /// Drift is large enough to move the baseline by `delta`
    Required { delta: DVec2 },
}

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// No snapshot existed for the confirmed sequence; nothing changed
    HistoryMiss,
    /// Drift was below the dead zone; nothing changed
    Suppressed { error: f64 },
    /// Baseline moved by `delta` and `replayed` inputs were re-applied
    Corrected { delta: DVec2, replayed: usize },
}

impl ReconcileOutcome {
    /// Whether local state was changed
    pub fn corrected(&self) -> bool {
        matches!(self, ReconcileOutcome::Corrected { .. })
    }
}

/// Dead-zone check for predicted vs authoritative positions
///
/// Small discrepancies come from ordinary timing noise; correcting them would
/// make the local actor jitter, so anything shorter than the dead zone is
/// left alone.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    dead_zone: f64,
}

impl Reconciler {
    /// Create a reconciler with the given dead-zone radius
    pub fn new(dead_zone: f64) -> Self {
        Self {
            dead_zone: dead_zone.max(0.0),
        }
    }

    /// Current dead-zone radius
    pub fn dead_zone(&self) -> f64 {
        self.dead_zone
    }

    /// Change the dead-zone radius
    pub fn set_dead_zone(&mut self, dead_zone: f64) {
        self.dead_zone = dead_zone.max(0.0);
    }

    /// Compare the position predicted for a sequence against the server's
    pub fn evaluate(&self, predicted: DVec2, authoritative: DVec2) -> Correction {
        let delta = authoritative - predicted;
        let error = delta.length();
        if error < self.dead_zone {
            Correction::WithinDeadZone { error }
        } else {
            Correction::Required { delta }
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(PredictionConfig::default().dead_zone)
    }
}

/// Re-apply `inputs` in order starting from `baseline`
///
/// `on_step` sees each record together with the state it produced, so the
/// caller can refresh its history.
pub fn replay<'a>(
    baseline: LocalMovementState,
    inputs: impl IntoIterator<Item = &'a InputRecord>,
    config: &PredictionConfig,
    mut on_step: impl FnMut(&InputRecord, &LocalMovementState),
) -> LocalMovementState {
    inputs.into_iter().fold(baseline, |state, record| {
        let next = predict_step(&state, &record.input, config);
        on_step(record, &next);
        next
    })
}
