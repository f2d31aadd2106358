//! Connection quality tiers
//!
//! Maps an observed or declared connection tier to a render delay and buffer
//! size, and applies it by calling the engines' `configure` methods. Slower
//! tiers buy more jitter tolerance with extra delay; faster tiers trade it
//! back for responsiveness.

use crate::config::{check_profile, InterpolationConfig, PredictionConfig};
use crate::error::Result;
use crate::interpolation::RemoteEntityInterpolator;
use crate::prediction::PredictionEngine;
use lagless_core::{StateHistory, TimeSource};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetworkQuality {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl NetworkQuality {
    /// Classify a measured round trip and jitter (both in milliseconds)
    pub fn from_rtt(rtt_ms: f64, jitter_ms: f64) -> Self {
        let score = rtt_ms.max(0.0) + 2.0 * jitter_ms.max(0.0);
        if !score.is_finite() || score >= 250.0 {
            NetworkQuality::Poor
        } else if score >= 120.0 {
            NetworkQuality::Fair
        } else if score >= 60.0 {
            NetworkQuality::Good
        } else {
            NetworkQuality::Excellent
        }
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkQuality::Excellent => "excellent",
            NetworkQuality::Good => "good",
            NetworkQuality::Fair => "fair",
            NetworkQuality::Poor => "poor",
        };
        f.write_str(name)
    }
}

/// Tuning for one quality tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Render-behind delay for remote entities, also used as the local
    /// correction easing window
    pub delay_ms: f64,
    /// Samples buffered per remote entity
    pub buffer_size: usize,
}

impl QualityProfile {
    pub const fn new(delay_ms: f64, buffer_size: usize) -> Self {
        Self {
            delay_ms,
            buffer_size,
        }
    }

    /// Copy of `config` with this profile's delay and buffer size
    pub fn interpolation(&self, config: &InterpolationConfig) -> InterpolationConfig {
        InterpolationConfig {
            delay_ms: self.delay_ms,
            max_buffer_size: self.buffer_size,
            ..config.clone()
        }
    }

    /// Copy of `config` with this profile's easing window
    pub fn prediction(&self, config: &PredictionConfig) -> PredictionConfig {
        PredictionConfig {
            smoothing_ms: self.delay_ms,
            ..config.clone()
        }
    }
}

/// Profiles for every tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityProfiles {
    pub excellent: QualityProfile,
    pub good: QualityProfile,
    pub fair: QualityProfile,
    pub poor: QualityProfile,
}

impl Default for QualityProfiles {
    fn default() -> Self {
        Self {
            excellent: QualityProfile::new(50.0, 5),
            good: QualityProfile::new(100.0, 10),
            fair: QualityProfile::new(150.0, 15),
            poor: QualityProfile::new(250.0, 20),
        }
    }
}

impl QualityProfiles {
    /// Profile for a tier
    pub fn get(&self, quality: NetworkQuality) -> QualityProfile {
        match quality {
            NetworkQuality::Excellent => self.excellent,
            NetworkQuality::Good => self.good,
            NetworkQuality::Fair => self.fair,
            NetworkQuality::Poor => self.poor,
        }
    }

    /// Check every profile
    pub fn validate(&self) -> Result<()> {
        check_profile("quality.excellent", &self.excellent)?;
        check_profile("quality.good", &self.good)?;
        check_profile("quality.fair", &self.fair)?;
        check_profile("quality.poor", &self.poor)
    }
}

/// Applies quality tiers to the prediction and interpolation engines
///
/// Holds no engine state of its own beyond the last applied tier, so it is
/// safe to call at any point in a session.
#[derive(Debug, Clone, Default)]
pub struct NetworkQualityAdapter {
    profiles: QualityProfiles,
    current: Option<NetworkQuality>,
}

impl NetworkQualityAdapter {
    /// Create an adapter with custom profiles
    pub fn new(profiles: QualityProfiles) -> Self {
        Self {
            profiles,
            current: None,
        }
    }

    /// The tier applied most recently
    pub fn current(&self) -> Option<NetworkQuality> {
        self.current
    }

    /// The configured profiles
    pub fn profiles(&self) -> &QualityProfiles {
        &self.profiles
    }

    /// Profile for a tier
    pub fn profile(&self, quality: NetworkQuality) -> QualityProfile {
        self.profiles.get(quality)
    }

    /// Reconfigure both engines for `quality`
    ///
    /// Only the engines' `configure` methods are called; buffered samples and
    /// pending inputs are left as they are.
    pub fn apply<H, C1, C2>(
        &mut self,
        quality: NetworkQuality,
        prediction: &mut PredictionEngine<H, C1>,
        interpolator: &mut RemoteEntityInterpolator<C2>,
    ) -> Result<QualityProfile>
    where
        H: StateHistory,
        C1: TimeSource,
        C2: TimeSource,
    {
        let profile = self.profile(quality);
        interpolator.configure(profile.interpolation(interpolator.config()))?;
        prediction.configure(profile.prediction(prediction.config()))?;

        if self.current != Some(quality) {
            info!(
                "Network quality now {} (delay {}ms, buffer {})",
                quality, profile.delay_ms, profile.buffer_size
            );
            self.current = Some(quality);
        }
        Ok(profile)
    }

    /// Classify a round-trip measurement and apply the resulting tier
    pub fn apply_hint<H, C1, C2>(
        &mut self,
        rtt_ms: f64,
        jitter_ms: f64,
        prediction: &mut PredictionEngine<H, C1>,
        interpolator: &mut RemoteEntityInterpolator<C2>,
    ) -> Result<NetworkQuality>
    where
        H: StateHistory,
        C1: TimeSource,
        C2: TimeSource,
    {
        let quality = NetworkQuality::from_rtt(rtt_ms, jitter_ms);
        self.apply(quality, prediction, interpolator)?;
        Ok(quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lagless_core::{DVec2, EntityId, ManualClock};
    use lagless_rollback_buffer::RollbackBuffer;

    fn engines(
        clock: &ManualClock,
    ) -> (
        PredictionEngine<RollbackBuffer, ManualClock>,
        RemoteEntityInterpolator<ManualClock>,
    ) {
        let prediction = PredictionEngine::with_defaults(clock.clone());
        let interpolator = RemoteEntityInterpolator::new(Default::default(), clock.clone()).unwrap();
        (prediction, interpolator)
    }

    #[test]
    fn test_from_rtt() {
        assert_eq!(NetworkQuality::from_rtt(20.0, 5.0), NetworkQuality::Excellent);
        assert_eq!(NetworkQuality::from_rtt(80.0, 5.0), NetworkQuality::Good);
        assert_eq!(NetworkQuality::from_rtt(100.0, 20.0), NetworkQuality::Fair);
        assert_eq!(NetworkQuality::from_rtt(300.0, 0.0), NetworkQuality::Poor);
        assert_eq!(NetworkQuality::from_rtt(f64::NAN, 0.0), NetworkQuality::Poor);
    }

    #[test]
    fn test_slower_tiers_buffer_more() {
        let profiles = QualityProfiles::default();
        let tiers = [
            NetworkQuality::Excellent,
            NetworkQuality::Good,
            NetworkQuality::Fair,
            NetworkQuality::Poor,
        ];
        for pair in tiers.windows(2) {
            let faster = profiles.get(pair[0]);
            let slower = profiles.get(pair[1]);
            assert!(slower.delay_ms > faster.delay_ms);
            assert!(slower.buffer_size > faster.buffer_size);
        }
    }

    #[test]
    fn test_apply_configures_both_engines() {
        let clock = ManualClock::new();
        let (mut prediction, mut interpolator) = engines(&clock);
        let mut adapter = NetworkQualityAdapter::default();

        let profile = adapter
            .apply(NetworkQuality::Poor, &mut prediction, &mut interpolator)
            .unwrap();

        assert_eq!(adapter.current(), Some(NetworkQuality::Poor));
        assert_eq!(interpolator.config().delay_ms, profile.delay_ms);
        assert_eq!(interpolator.config().max_buffer_size, profile.buffer_size);
        assert_eq!(prediction.config().smoothing_ms, profile.delay_ms);
        // Untouched fields keep their values
        assert_eq!(interpolator.config().extrapolation_window_ms, 200.0);
    }

    #[test]
    fn test_apply_keeps_buffered_samples() {
        let clock = ManualClock::new();
        let (mut prediction, mut interpolator) = engines(&clock);
        let mut adapter = NetworkQualityAdapter::default();

        let id = EntityId::new(1);
        for i in 0..8 {
            clock.advance(50.0);
            interpolator.update_entity(id, DVec2::new(i as f64, 0.0), None, None);
        }

        adapter
            .apply(NetworkQuality::Excellent, &mut prediction, &mut interpolator)
            .unwrap();
        assert_eq!(interpolator.entity(id).map(|e| e.sample_count()), Some(8));

        // Next append truncates to the new, smaller size
        interpolator.update_entity(id, DVec2::new(9.0, 0.0), None, None);
        assert_eq!(interpolator.entity(id).map(|e| e.sample_count()), Some(5));
    }

    #[test]
    fn test_apply_hint() {
        let clock = ManualClock::new();
        let (mut prediction, mut interpolator) = engines(&clock);
        let mut adapter = NetworkQualityAdapter::default();

        let tier = adapter
            .apply_hint(180.0, 10.0, &mut prediction, &mut interpolator)
            .unwrap();
        assert_eq!(tier, NetworkQuality::Fair);
        assert_eq!(interpolator.config().delay_ms, 150.0);
    }
}
