//! Netcode configuration
//!
//! Typed, defaulted settings for the prediction and interpolation engines.
//! Every struct validates itself before an engine accepts it, and the whole
//! set can be loaded from RON:
//!
//! ```ron
//! (
//!     prediction: (dead_zone: 4.0, move_speed: 240.0),
//!     interpolation: (delay_ms: 120.0),
//!     initial_quality: Some(Fair),
//! )
//! ```
//!
//! Omitted fields keep their defaults.

use crate::error::{Error, Result};
use crate::quality::{NetworkQuality, QualityProfile, QualityProfiles};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn check(ok: bool, what: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfig(what()))
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    check(value.is_finite() && value > 0.0, || {
        format!("{name} must be a positive number, got {value}")
    })
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    check(value.is_finite() && value >= 0.0, || {
        format!("{name} must be zero or greater, got {value}")
    })
}

fn unit_factor(name: &str, value: f64) -> Result<()> {
    check(value.is_finite() && value > 0.0 && value <= 1.0, || {
        format!("{name} must be in (0, 1], got {value}")
    })
}

pub(crate) fn check_profile(name: &str, profile: &QualityProfile) -> Result<()> {
    non_negative(&format!("{name}.delay_ms"), profile.delay_ms)?;
    check(profile.buffer_size > 0, || {
        format!("{name}.buffer_size must be at least 1")
    })
}

/// Settings for local prediction and reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Fixed simulation step per input, in milliseconds
    pub tick_ms: f64,
    /// Movement speed in world units per second
    pub move_speed: f64,
    /// Corrections smaller than this distance are ignored
    pub dead_zone: f64,
    /// Length of the render easing window after a correction
    pub smoothing_ms: f64,
    /// Unconfirmed inputs kept before the oldest is dropped
    pub max_pending_inputs: usize,
    /// Slots in the state history ring buffer
    pub history_capacity: usize,
    /// State snapshots older than this are pruned by `update()`
    pub history_max_age_ms: f64,
    /// Unconfirmed inputs older than this are pruned by `update()`
    pub input_max_age_ms: f64,
    /// When set, chunk coordinates are re-derived from position after each step
    pub chunk_size: Option<f64>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16.0,
            move_speed: 200.0,
            dead_zone: 5.0,
            smoothing_ms: 100.0,
            max_pending_inputs: 120,
            history_capacity: 128,
            history_max_age_ms: 2000.0,
            input_max_age_ms: 1000.0,
            chunk_size: None,
        }
    }
}

impl PredictionConfig {
    /// Distance one full-speed input moves the actor
    pub fn step_distance(&self) -> f64 {
        self.move_speed * self.tick_ms / 1000.0
    }

    /// Check every field
    pub fn validate(&self) -> Result<()> {
        positive("prediction.tick_ms", self.tick_ms)?;
        non_negative("prediction.move_speed", self.move_speed)?;
        non_negative("prediction.dead_zone", self.dead_zone)?;
        non_negative("prediction.smoothing_ms", self.smoothing_ms)?;
        positive("prediction.history_max_age_ms", self.history_max_age_ms)?;
        positive("prediction.input_max_age_ms", self.input_max_age_ms)?;
        check(self.max_pending_inputs > 0, || {
            "prediction.max_pending_inputs must be at least 1".to_string()
        })?;
        check(self.history_capacity > 0, || {
            "prediction.history_capacity must be at least 1".to_string()
        })?;
        if let Some(size) = self.chunk_size {
            positive("prediction.chunk_size", size)?;
        }
        Ok(())
    }
}

/// Settings for remote entity interpolation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// How far behind "now" remote entities are rendered
    pub delay_ms: f64,
    /// Samples buffered per entity; the oldest is dropped beyond this
    pub max_buffer_size: usize,
    /// Silence longer than this hides an entity instead of extrapolating it
    pub extrapolation_window_ms: f64,
    /// Per-frame share of the gap closed by position smoothing
    pub position_smoothing: f64,
    /// Per-frame share of the arc closed by rotation smoothing
    pub rotation_smoothing: f64,
    /// Per-frame share of the gap closed by health smoothing
    pub health_smoothing: f64,
    /// Health snaps to its target once closer than this
    pub health_snap_threshold: f64,
    /// Samples older than this are pruned by `update()`
    pub sample_max_age_ms: f64,
    /// Entities silent for longer than this are removed by `update()`
    pub entity_timeout_ms: f64,
    /// Minimum displacement that marks an entity as moving
    pub moving_threshold: f64,
    /// Health assumed when the first snapshot carries none
    pub default_health: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100.0,
            max_buffer_size: 10,
            extrapolation_window_ms: 200.0,
            position_smoothing: 0.15,
            rotation_smoothing: 0.1,
            health_smoothing: 0.2,
            health_snap_threshold: 1.0,
            sample_max_age_ms: 1000.0,
            entity_timeout_ms: 5000.0,
            moving_threshold: 0.01,
            default_health: 100.0,
        }
    }
}

impl InterpolationConfig {
    /// Check every field
    pub fn validate(&self) -> Result<()> {
        non_negative("interpolation.delay_ms", self.delay_ms)?;
        check(self.max_buffer_size > 0, || {
            "interpolation.max_buffer_size must be at least 1".to_string()
        })?;
        positive(
            "interpolation.extrapolation_window_ms",
            self.extrapolation_window_ms,
        )?;
        unit_factor("interpolation.position_smoothing", self.position_smoothing)?;
        unit_factor("interpolation.rotation_smoothing", self.rotation_smoothing)?;
        unit_factor("interpolation.health_smoothing", self.health_smoothing)?;
        non_negative(
            "interpolation.health_snap_threshold",
            self.health_snap_threshold,
        )?;
        positive("interpolation.sample_max_age_ms", self.sample_max_age_ms)?;
        positive("interpolation.entity_timeout_ms", self.entity_timeout_ms)?;
        non_negative("interpolation.moving_threshold", self.moving_threshold)?;
        non_negative("interpolation.default_health", self.default_health)?;
        check(self.entity_timeout_ms >= self.extrapolation_window_ms, || {
            "interpolation.entity_timeout_ms must not be shorter than extrapolation_window_ms"
                .to_string()
        })
    }
}

/// Complete configuration for a client session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetcodeConfig {
    pub prediction: PredictionConfig,
    pub interpolation: InterpolationConfig,
    /// Tuning applied per connection quality tier
    pub quality: QualityProfiles,
    /// Tier applied when the session starts, if any
    pub initial_quality: Option<NetworkQuality>,
}

impl NetcodeConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: NetcodeConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.prediction.validate()?;
        self.interpolation.validate()?;
        self.quality.validate()
    }
}
